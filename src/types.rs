use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::token::SpinToken;

/// Uniform response envelope: `{ok: true, ...data}` or `{ok: false, error}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn error(code: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(code.into()),
            data: None,
        }
    }
}

/// Prize payout kind: percentage of the order subtotal or a fixed amount.
#[derive(
    Debug, Clone, Copy, PartialEq, Deserialize, Serialize, AsExpression, FromSqlRow, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[diesel(sql_type = Text)]
pub enum PrizeType {
    Percent,
    Amount,
}

impl ToSql<Text, Sqlite> for PrizeType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        match *self {
            PrizeType::Percent => <&str as ToSql<Text, Sqlite>>::to_sql(&"percent", out),
            PrizeType::Amount => <&str as ToSql<Text, Sqlite>>::to_sql(&"amount", out),
        }
    }
}

impl FromSql<Text, Sqlite> for PrizeType {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let type_str = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        match type_str.as_str() {
            "percent" => Ok(PrizeType::Percent),
            "amount" => Ok(PrizeType::Amount),
            _ => Err("Invalid prize type".into()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct VerifyCodeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyData {
    pub token: SpinToken,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct SpinRequest {
    pub token: Option<SpinToken>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrizeSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub value: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponSummary {
    pub code: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SpinData {
    pub prize: PrizeSummary,
    pub coupon: CouponSummary,
    pub client_signature: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct CouponRequest {
    pub code: Option<String>,
    pub order_total: Option<i64>,
}

/// Prize terms attached to a coupon, as shown to the storefront.
#[derive(Debug, Serialize, ToSchema)]
pub struct PrizeTerms {
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub value: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponCheckData {
    pub discount: i64,
    pub prize: PrizeTerms,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Option<String>,
    pub product_name: String,
    pub product_dosage: Option<String>,
    /// Unit price in minor currency units.
    pub price: i64,
    pub quantity: i32,
}

// Everything is optional at the wire level so a sparse payload still gets an
// error in the response envelope rather than an extractor rejection.
#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct OrderInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[serde(rename = "couponCode")]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, ToSchema)]
pub struct CreateOrderRequest {
    pub order: Option<OrderInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderData {
    pub order_id: String,
    pub subtotal: i64,
    pub discount: i64,
    pub total_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct ListData<T: Serialize> {
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ItemData<T: Serialize> {
    pub data: T,
}

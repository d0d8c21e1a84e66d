use crate::types::{OrderItemInput, PrizeType};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Queryable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::promo_codes)]
pub struct PromoCode {
    pub id: String,
    pub code: String,
    pub code_hash: String,
    pub code_hmac: String,
    pub campaign: String,
    pub used_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl PromoCode {
    pub fn new(code: String, code_hash: String, code_hmac: String, campaign: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            code_hash,
            code_hmac,
            campaign,
            used_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Queryable, Insertable, Identifiable, Debug, Clone, Serialize)]
#[diesel(table_name = crate::schema::prizes)]
pub struct Prize {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub value: f64,
    pub weight: f64,
    /// Remaining award capacity; `None` means unlimited.
    pub stock: Option<i32>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

impl Prize {
    pub fn new(
        name: String,
        prize_type: PrizeType,
        value: f64,
        weight: f64,
        stock: Option<i32>,
        active: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            prize_type,
            value,
            weight,
            stock,
            active,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Queryable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::coupons)]
pub struct Coupon {
    pub id: String,
    pub code: String,
    pub prize_id: String,
    pub redeemed: bool,
    pub expires_at: NaiveDateTime,
    pub user_ip: Option<String>,
    pub client_signature: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Coupon {
    pub fn new(
        code: String,
        prize_id: String,
        expires_at: NaiveDateTime,
        user_ip: Option<String>,
        client_signature: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            code,
            prize_id,
            redeemed: false,
            expires_at,
            user_ip,
            client_signature,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Queryable, Insertable, Identifiable, Debug, Clone, Serialize)]
#[diesel(table_name = crate::schema::orders)]
pub struct Order {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub payment_method: String,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub coupon_code: Option<String>,
    pub prize_type: Option<PrizeType>,
    pub prize_value: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Insertable, Identifiable, Debug, Clone, Serialize)]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: Option<String>,
    pub product_name: String,
    pub product_dosage: Option<String>,
    pub price: i64,
    pub quantity: i32,
}

impl OrderItem {
    pub fn new(order_id: String, input: &OrderItemInput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id,
            product_id: input.product_id.clone(),
            product_name: input.product_name.trim().to_string(),
            product_dosage: input.product_dosage.clone(),
            price: input.price,
            quantity: input.quantity,
        }
    }
}

use crate::error::{AppError, AppResult};
use crate::model::{Coupon, Prize};
use crate::types::{ApiResponse, CouponCheckData, CouponRequest, PrizeTerms, PrizeType};
use crate::AppState;
use axum::extract::State;
use axum::Json;
use diesel::prelude::*;

/// Discount for a coupon's prize against an order subtotal, in minor units.
/// Percent prizes floor, amount prizes cap at the subtotal.
pub fn compute_discount(prize_type: PrizeType, value: f64, subtotal: i64) -> i64 {
    match prize_type {
        PrizeType::Percent => ((subtotal as f64) * (value / 100.0)).floor() as i64,
        PrizeType::Amount => subtotal.min(value as i64),
    }
}

/// Shared validation contract: the coupon must exist, be unredeemed and
/// unexpired.
pub fn load_valid_coupon(
    conn: &mut SqliteConnection,
    coupon_code: &str,
) -> AppResult<(Coupon, Prize)> {
    let coupon: Option<Coupon> = {
        use crate::schema::coupons::dsl::*;
        coupons.filter(code.eq(coupon_code)).first(conn).optional()?
    };

    let coupon = coupon.ok_or(AppError::NotFound)?;
    if coupon.redeemed {
        return Err(AppError::CouponAlreadyRedeemed);
    }
    if coupon.expires_at < chrono::Utc::now().naive_utc() {
        return Err(AppError::CouponExpired);
    }

    let prize: Prize = {
        use crate::schema::prizes::dsl::*;
        prizes.filter(id.eq(&coupon.prize_id)).first(conn)?
    };

    Ok((coupon, prize))
}

/// Flip `redeemed` from false to true with a conditional write. Zero affected
/// rows means a concurrent redemption won; the caller must not apply the
/// discount.
pub fn mark_redeemed(conn: &mut SqliteConnection, coupon_id: &str) -> AppResult<()> {
    use crate::schema::coupons::dsl::*;

    let updated =
        diesel::update(coupons.filter(id.eq(coupon_id).and(redeemed.eq(false))))
            .set(redeemed.eq(true))
            .execute(conn)?;

    if updated == 0 {
        return Err(AppError::CouponRaceCondition);
    }
    Ok(())
}

fn required_code(payload: &CouponRequest) -> AppResult<&str> {
    let code = payload.code.as_deref().map(str::trim).unwrap_or("");
    if code.is_empty() {
        return Err(AppError::CodeRequired);
    }
    Ok(code)
}

/// Read-only coupon check: reports the prize terms and the discount the
/// supplied order total would receive. The authoritative subtotal for pricing
/// is always recomputed during order creation.
#[utoipa::path(
    post,
    path = "/api/validate-coupon",
    request_body = CouponRequest,
    responses(
        (status = 200, description = "Coupon is redeemable", body = CouponCheckData),
        (status = 400, description = "Coupon already redeemed or expired"),
        (status = 404, description = "Coupon not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CouponRequest>,
) -> Result<Json<ApiResponse<CouponCheckData>>, AppError> {
    let code = required_code(&payload)?.to_string();
    let subtotal = payload.order_total.unwrap_or(0).max(0);

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    let (_, prize) = load_valid_coupon(&mut conn, &code)?;
    let discount = compute_discount(prize.prize_type, prize.value, subtotal);

    Ok(Json(ApiResponse::ok(CouponCheckData {
        discount,
        prize: PrizeTerms {
            prize_type: prize.prize_type,
            value: prize.value,
        },
    })))
}

/// Validate and consume a coupon in one call. Redemption is exclusive: the
/// conditional write guarantees at most one success under concurrency.
#[utoipa::path(
    post,
    path = "/api/redeem-coupon",
    request_body = CouponRequest,
    responses(
        (status = 200, description = "Coupon redeemed", body = CouponCheckData),
        (status = 400, description = "Coupon already redeemed or expired"),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Lost a concurrent redemption race"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Coupons"
)]
pub async fn redeem_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CouponRequest>,
) -> Result<Json<ApiResponse<CouponCheckData>>, AppError> {
    let code = required_code(&payload)?.to_string();
    let subtotal = payload.order_total.unwrap_or(0).max(0);

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    let (coupon, prize) = load_valid_coupon(&mut conn, &code)?;
    let discount = compute_discount(prize.prize_type, prize.value, subtotal);
    mark_redeemed(&mut conn, &coupon.id)?;

    Ok(Json(ApiResponse::ok(CouponCheckData {
        discount,
        prize: PrizeTerms {
            prize_type: prize.prize_type,
            value: prize.value,
        },
    })))
}

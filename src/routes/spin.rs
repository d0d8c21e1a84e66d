use crate::error::{AppError, AppResult};
use crate::model::{Coupon, Prize};
use crate::types::{ApiResponse, CouponSummary, PrizeSummary, SpinData, SpinRequest};
use crate::wheel;
use crate::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::Rng;

/// Coupons stay redeemable for a year after the spin.
const COUPON_TTL_DAYS: i64 = 365;

fn ensure_code_unused(conn: &mut SqliteConnection, promo_code_id: &str) -> AppResult<()> {
    use crate::schema::promo_codes::dsl::*;

    let row: Option<(String, Option<NaiveDateTime>)> = promo_codes
        .filter(id.eq(promo_code_id))
        .select((id, used_at))
        .first(conn)
        .optional()?;

    // A token may outlive its code's single use; a missing row gets the same
    // answer as a consumed one.
    match row {
        Some((_, None)) => Ok(()),
        _ => Err(AppError::AlreadyUsed),
    }
}

fn load_active_prizes(conn: &mut SqliteConnection) -> AppResult<Vec<Prize>> {
    use crate::schema::prizes::dsl::*;

    // Ordered by id so the selection walk is deterministic for a given draw.
    Ok(prizes
        .filter(active.eq(true))
        .order(id.asc())
        .load::<Prize>(conn)?)
}

/// Atomically consume the promo code, decrement finite stock and insert the
/// coupon. A stock decrement that would go negative rolls the whole
/// transaction back with `PrizeOutOfStock` so the caller can reselect.
pub fn commit_spin(
    conn: &mut SqliteConnection,
    spin_code_id: &str,
    prize: &Prize,
    coupon: &Coupon,
) -> AppResult<()> {
    conn.transaction::<_, AppError, _>(|conn| {
        {
            use crate::schema::promo_codes::dsl::*;
            let consumed = diesel::update(
                promo_codes.filter(id.eq(spin_code_id).and(used_at.is_null())),
            )
            .set(used_at.eq(Utc::now().naive_utc()))
            .execute(conn)?;
            if consumed == 0 {
                return Err(AppError::AlreadyUsed);
            }
        }

        if prize.stock.is_some() {
            use crate::schema::prizes::dsl::*;
            let decremented =
                diesel::update(prizes.filter(id.eq(&prize.id).and(stock.gt(0))))
                    .set(stock.eq(stock - 1))
                    .execute(conn)?;
            if decremented == 0 {
                return Err(AppError::PrizeOutOfStock);
            }
        }

        diesel::insert_into(crate::schema::coupons::table)
            .values(coupon)
            .execute(conn)?;

        Ok(())
    })
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Externally visible coupon codes use a namespace distinct from promo codes.
fn new_coupon_code(rng: &mut impl Rng) -> String {
    let bytes: [u8; 4] = rng.gen();
    let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    format!("C-{}", hex)
}

fn new_client_signature(rng: &mut impl Rng) -> String {
    let bytes: [u8; 16] = rng.gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn rfc3339(naive: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).to_rfc3339()
}

/// Pick a prize from the supplied pool and commit the spin. If the chosen
/// prize's stock hits zero between selection and commit, reselect once from
/// the remaining pool with a fresh coupon code; a second stock failure is
/// fatal. Takes the pool by value so the retry can drop the failed prize.
pub fn select_and_commit(
    conn: &mut SqliteConnection,
    promo_code_id: &str,
    prizes: Vec<Prize>,
    rng: &mut impl Rng,
    expires_at: NaiveDateTime,
    user_ip: Option<String>,
    client_signature: String,
) -> AppResult<(Prize, Coupon)> {
    let first = wheel::weighted_pick(&prizes, rng)
        .ok_or(AppError::NoPrizes)?
        .clone();
    let coupon = Coupon::new(
        new_coupon_code(rng),
        first.id.clone(),
        expires_at,
        user_ip.clone(),
        Some(client_signature.clone()),
    );

    match commit_spin(conn, promo_code_id, &first, &coupon) {
        Ok(()) => Ok((first, coupon)),
        Err(AppError::PrizeOutOfStock) => {
            // The chosen prize sold out between selection and commit.
            let remaining: Vec<Prize> =
                prizes.into_iter().filter(|p| p.id != first.id).collect();
            let second = wheel::weighted_pick(&remaining, rng)
                .ok_or(AppError::NoPrizes)?
                .clone();
            let coupon = Coupon::new(
                new_coupon_code(rng),
                second.id.clone(),
                expires_at,
                user_ip,
                Some(client_signature),
            );
            commit_spin(conn, promo_code_id, &second, &coupon).map_err(|e| match e {
                AppError::PrizeOutOfStock => {
                    AppError::Internal("prize stock exhausted twice in one spin".to_string())
                }
                other => other,
            })?;
            Ok((second, coupon))
        }
        Err(e) => Err(e),
    }
}

/// Consume a spin token: award a weighted-random prize and issue the coupon.
///
/// If the chosen prize sells out between selection and commit, a different
/// prize is selected from the remaining pool exactly once; a second stock
/// failure is fatal.
#[utoipa::path(
    post,
    path = "/api/spin",
    request_body = SpinRequest,
    responses(
        (status = 200, description = "Prize awarded and coupon issued", body = SpinData),
        (status = 400, description = "Invalid token, consumed code or no prizes"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Wheel"
)]
pub async fn spin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SpinRequest>,
) -> Result<Json<ApiResponse<SpinData>>, AppError> {
    let token = payload.token.ok_or(AppError::InvalidToken)?;
    let promo_code_id = token
        .verify(&state.secrets.spin_secret)?
        .promo_code_id
        .clone();

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    ensure_code_unused(&mut conn, &promo_code_id)?;

    let prizes = load_active_prizes(&mut conn)?;
    let mut rng = rand::thread_rng();
    let expires_at = (Utc::now() + Duration::days(COUPON_TTL_DAYS)).naive_utc();
    let user_ip = client_ip(&headers);
    let client_signature = new_client_signature(&mut rng);

    let (awarded, coupon) = select_and_commit(
        &mut conn,
        &promo_code_id,
        prizes,
        &mut rng,
        expires_at,
        user_ip,
        client_signature.clone(),
    )?;

    Ok(Json(ApiResponse::ok(SpinData {
        prize: PrizeSummary {
            id: awarded.id,
            name: awarded.name,
            prize_type: awarded.prize_type,
            value: awarded.value,
        },
        coupon: CouponSummary {
            code: coupon.code,
            expires_at: rfc3339(coupon.expires_at),
        },
        client_signature,
    })))
}

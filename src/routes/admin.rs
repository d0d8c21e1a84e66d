use std::collections::{BTreeMap, HashSet};

use crate::error::{AppError, AppResult};
use crate::model::{Order, PromoCode, Prize};
use crate::types::{ApiResponse, ItemData, ListData, PrizeType};
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Unambiguous alphabet for printed codes (no 0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_BATCH: i64 = 5000;
const LIST_CAP: i64 = 2000;

// Printed promo codes are low-value, single-use credentials; a reduced cost
// keeps large batch generation tractable.
const CODE_HASH_COST: u32 = 8;

fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let provided = headers
        .get("x-admin-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided.is_empty() || provided != state.secrets.admin_secret {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn random_promo_code(rng: &mut impl Rng) -> String {
    let mut pick = |n: usize| -> String {
        (0..n)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    };
    let head = pick(4);
    let tail = pick(4);
    format!("{}-{}", head, tail)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateCodesRequest {
    pub count: Option<i64>,
    pub campaign: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedCode {
    pub code: String,
    pub campaign: String,
}

/// Mint a batch of promo codes. Plaintext is returned once here for print
/// runs; only the bcrypt hash and the lookup digest matter afterwards.
pub async fn generate_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateCodesRequest>,
) -> Result<Json<ApiResponse<ListData<GeneratedCode>>>, AppError> {
    require_admin(&state, &headers)?;

    let n = payload.count.unwrap_or(50).clamp(1, MAX_BATCH) as usize;
    let campaign = payload.campaign.unwrap_or_else(|| "Flyer".to_string());

    let mut rng = rand::thread_rng();
    let mut seen: HashSet<String> = HashSet::with_capacity(n);
    let mut rows: Vec<PromoCode> = Vec::with_capacity(n);

    while rows.len() < n {
        let code = random_promo_code(&mut rng);
        if !seen.insert(code.clone()) {
            continue;
        }
        let hash = bcrypt::hash(&code, CODE_HASH_COST)?;
        let digest = state.secrets.code_digest(&code);
        rows.push(PromoCode::new(code, hash, digest, campaign.clone()));
    }

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;
    diesel::insert_into(crate::schema::promo_codes::table)
        .values(&rows)
        .execute(&mut conn)?;

    let data = rows
        .into_iter()
        .map(|r| GeneratedCode {
            code: r.code,
            campaign: r.campaign,
        })
        .collect();

    Ok(Json(ApiResponse::ok(ListData { data })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Queryable)]
pub struct CodeRow {
    pub id: String,
    pub code: String,
    pub campaign: String,
    pub used_at: Option<NaiveDateTime>,
}

pub async fn list_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListQuery>,
) -> Result<Json<ApiResponse<ListData<CodeRow>>>, AppError> {
    require_admin(&state, &headers)?;

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    use crate::schema::promo_codes::dsl::*;
    let mut query = promo_codes
        .select((id, code, campaign, used_at))
        .order(created_at.desc())
        .into_boxed();

    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        query = query.filter(code.eq(q.to_string()).or(campaign.like(pattern)));
    }

    let limit = params.limit.unwrap_or(LIST_CAP).clamp(1, LIST_CAP);
    let data = query.limit(limit).load::<CodeRow>(&mut conn)?;

    Ok(Json(ApiResponse::ok(ListData { data })))
}

pub async fn list_prizes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ListData<Prize>>>, AppError> {
    require_admin(&state, &headers)?;

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    use crate::schema::prizes::dsl::*;
    let data = prizes.order(id.asc()).load::<Prize>(&mut conn)?;

    Ok(Json(ApiResponse::ok(ListData { data })))
}

// Distinguishes an absent field (no change) from an explicit null
// (clear the stock limit).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PrizePatch {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub prize_type: Option<PrizeType>,
    pub value: Option<f64>,
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub stock: Option<Option<i32>>,
    pub active: Option<bool>,
}

pub async fn update_prize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<PrizePatch>,
) -> Result<Json<ApiResponse<ItemData<Prize>>>, AppError> {
    require_admin(&state, &headers)?;

    let prize_id = patch.id.as_deref().ok_or(AppError::IdRequired)?;

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    use crate::schema::prizes::dsl::*;
    let mut row: Prize = prizes
        .filter(id.eq(prize_id))
        .first(&mut conn)
        .optional()?
        .ok_or(AppError::NotFound)?;

    if let Some(new_name) = patch.name {
        row.name = new_name;
    }
    if let Some(new_type) = patch.prize_type {
        row.prize_type = new_type;
    }
    if let Some(new_value) = patch.value {
        row.value = new_value;
    }
    if let Some(new_weight) = patch.weight {
        row.weight = new_weight;
    }
    if let Some(new_stock) = patch.stock {
        row.stock = new_stock;
    }
    if let Some(new_active) = patch.active {
        row.active = new_active;
    }

    // A negative value would turn the discount into a surcharge; a negative
    // weight breaks the selection walk.
    if row.value < 0.0 || row.weight < 0.0 || row.stock.map_or(false, |s| s < 0) {
        return Err(AppError::InvalidPrize);
    }

    diesel::update(prizes.filter(id.eq(&row.id)))
        .set((
            name.eq(&row.name),
            prize_type.eq(row.prize_type),
            value.eq(row.value),
            weight.eq(row.weight),
            stock.eq(row.stock),
            active.eq(row.active),
        ))
        .execute(&mut conn)?;

    Ok(Json(ApiResponse::ok(ItemData { data: row })))
}

pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListQuery>,
) -> Result<Json<ApiResponse<ListData<Order>>>, AppError> {
    require_admin(&state, &headers)?;

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    use crate::schema::orders::dsl::*;
    let mut query = orders.order(created_at.desc()).into_boxed();

    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        query = query.filter(
            phone
                .like(pattern.clone())
                .or(name.like(pattern.clone()))
                .or(city.like(pattern))
                .or(coupon_code.eq(q.to_string())),
        );
    }

    let limit = params.limit.unwrap_or(100).clamp(1, LIST_CAP);
    let data = query.limit(limit).load::<Order>(&mut conn)?;

    Ok(Json(ApiResponse::ok(ListData { data })))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsTotals {
    pub promo_codes_total: i64,
    pub promo_codes_used: i64,
    pub coupons_total: i64,
    pub coupons_redeemed: i64,
    pub orders_total: i64,
    pub usage_rate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelinePoint {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsData {
    pub totals: StatsTotals,
    pub timeline: Vec<TimelinePoint>,
}

/// Campaign totals plus spins per day for the last 30 days (one coupon row is
/// exactly one successful spin).
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<StatsData>>, AppError> {
    require_admin(&state, &headers)?;

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    let (promo_codes_total, promo_codes_used) = {
        use crate::schema::promo_codes::dsl::*;
        (
            promo_codes.count().get_result::<i64>(&mut conn)?,
            promo_codes
                .filter(used_at.is_not_null())
                .count()
                .get_result::<i64>(&mut conn)?,
        )
    };

    let (coupons_total, coupons_redeemed, spin_days) = {
        use crate::schema::coupons::dsl::*;
        let since = (chrono::Utc::now() - chrono::Duration::days(30)).naive_utc();
        (
            coupons.count().get_result::<i64>(&mut conn)?,
            coupons
                .filter(redeemed.eq(true))
                .count()
                .get_result::<i64>(&mut conn)?,
            coupons
                .filter(created_at.ge(since))
                .select(created_at)
                .load::<NaiveDateTime>(&mut conn)?,
        )
    };

    let orders_total = {
        use crate::schema::orders::dsl::*;
        orders.count().get_result::<i64>(&mut conn)?
    };

    let mut by_day: BTreeMap<String, i64> = BTreeMap::new();
    for stamp in spin_days {
        *by_day.entry(stamp.date().to_string()).or_insert(0) += 1;
    }
    let timeline = by_day
        .into_iter()
        .map(|(date, count)| TimelinePoint { date, count })
        .collect();

    let usage_rate = promo_codes_used as f64 / promo_codes_total.max(1) as f64;

    Ok(Json(ApiResponse::ok(StatsData {
        totals: StatsTotals {
            promo_codes_total,
            promo_codes_used,
            coupons_total,
            coupons_redeemed,
            orders_total,
            usage_rate,
        },
        timeline,
    })))
}

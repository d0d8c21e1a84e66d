use crate::error::{AppError, AppResult};
use crate::model::PromoCode;
use crate::token::SpinToken;
use crate::types::{ApiResponse, VerifyCodeRequest, VerifyData};
use crate::AppState;
use axum::extract::State;
use axum::Json;
use diesel::prelude::*;

fn lookup_unused_code(conn: &mut SqliteConnection, digest: &str) -> AppResult<PromoCode> {
    use crate::schema::promo_codes::dsl::*;

    let row: Option<PromoCode> = promo_codes
        .filter(code_hmac.eq(digest))
        .first(conn)
        .optional()?;

    let row = row.ok_or(AppError::InvalidCode)?;
    if row.used_at.is_some() {
        return Err(AppError::AlreadyUsed);
    }
    Ok(row)
}

/// Verify a raw promo code and mint a short-lived spin token.
///
/// Lookup goes through the keyed digest; the bcrypt hash must also match
/// before a token is minted. No side effects on the stored code.
#[utoipa::path(
    post,
    path = "/api/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code accepted, spin token minted", body = VerifyData),
        (status = 400, description = "Missing, unknown or already used code"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Wheel"
)]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<VerifyData>>, AppError> {
    let raw = payload.code.as_deref().map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(AppError::CodeRequired);
    }

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    let row = lookup_unused_code(&mut conn, &state.secrets.code_digest(raw))?;

    if !bcrypt::verify(raw, &row.code_hash)? {
        return Err(AppError::InvalidCode);
    }

    let token = SpinToken::issue(row.id, &state.secrets.spin_secret);
    Ok(Json(ApiResponse::ok(VerifyData { token })))
}

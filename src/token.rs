use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::env;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// A capability token authorizes exactly one spin for 5 minutes.
pub const SPIN_TOKEN_TTL_MS: i64 = 5 * 60 * 1000;

/// Server-side signing keys. One key enables the promo-code lookup digest,
/// a second, distinct key authorizes spin execution.
#[derive(Clone)]
pub struct Secrets {
    pub code_secret: String,
    pub spin_secret: String,
    pub admin_secret: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            code_secret: env::var("HMAC_SECRET")
                .map_err(|_| "HMAC_SECRET environment variable must be set")?,
            spin_secret: env::var("SPIN_SECRET")
                .map_err(|_| "SPIN_SECRET environment variable must be set")?,
            admin_secret: env::var("ADMIN_SECRET")
                .map_err(|_| "ADMIN_SECRET environment variable must be set")?,
        })
    }

    /// Deterministic lookup digest for a raw promo code. The same function is
    /// used at generation and verification time so stored digests always match.
    pub fn code_digest(&self, code: &str) -> String {
        hmac_b64url(self.code_secret.as_bytes(), code.as_bytes())
    }
}

fn hmac_b64url(key: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPayload {
    pub promo_code_id: String,
    /// Expiry as epoch milliseconds.
    pub exp: i64,
}

/// Short-lived signed credential proving a promo code passed verification.
/// Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpinToken {
    pub payload: TokenPayload,
    pub signature: String,
}

impl SpinToken {
    /// Mint a token for a verified promo code, valid for 5 minutes.
    pub fn issue(promo_code_id: String, spin_secret: &str) -> Self {
        let payload = TokenPayload {
            promo_code_id,
            exp: chrono::Utc::now().timestamp_millis() + SPIN_TOKEN_TTL_MS,
        };
        Self::sign(payload, spin_secret)
    }

    pub fn sign(payload: TokenPayload, spin_secret: &str) -> Self {
        let serialized = serde_json::to_vec(&payload).expect("token payload serializes");
        let signature = hmac_b64url(spin_secret.as_bytes(), &serialized);
        Self { payload, signature }
    }

    /// Recompute the signature over the serialized payload and check expiry.
    /// Pure, no I/O; must pass before any privileged spin action.
    pub fn verify(&self, spin_secret: &str) -> AppResult<&TokenPayload> {
        let serialized =
            serde_json::to_vec(&self.payload).map_err(|e| AppError::Internal(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(spin_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(&serialized);

        let signature = URL_SAFE_NO_PAD
            .decode(&self.signature)
            .map_err(|_| AppError::InvalidToken)?;
        mac.verify_slice(&signature)
            .map_err(|_| AppError::InvalidToken)?;

        if self.payload.exp <= chrono::Utc::now().timestamp_millis() {
            return Err(AppError::InvalidToken);
        }
        Ok(&self.payload)
    }
}

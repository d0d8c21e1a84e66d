use crate::types::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

/// Application-specific error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Promo code is required")]
    CodeRequired,

    #[error("Promo code not found or hash mismatch")]
    InvalidCode,

    #[error("Promo code already used")]
    AlreadyUsed,

    #[error("Spin token signature or expiry check failed")]
    InvalidToken,

    #[error("No active prizes with remaining stock")]
    NoPrizes,

    #[error("Chosen prize sold out before commit")]
    PrizeOutOfStock,

    #[error("Record not found")]
    NotFound,

    #[error("Coupon already redeemed")]
    CouponAlreadyRedeemed,

    #[error("Coupon expired")]
    CouponExpired,

    #[error("Coupon redeemed concurrently")]
    CouponRaceCondition,

    #[error("Admin secret missing or mismatched")]
    Unauthorized,

    #[error("Order payload is required")]
    OrderRequired,

    #[error("Order name and phone are required")]
    NamePhoneRequired,

    #[error("Order must contain at least one item")]
    ItemsRequired,

    #[error("Item price or quantity out of range")]
    InvalidItems,

    #[error("Prize value, weight and stock must be non-negative")]
    InvalidPrize,

    #[error("Prize id is required")]
    IdRequired,

    #[error("Database connection failed")]
    DatabaseConnection,

    #[error("Database operation failed: {0}")]
    DatabaseOperation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the appropriate HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::CodeRequired
            | AppError::InvalidCode
            | AppError::AlreadyUsed
            | AppError::InvalidToken
            | AppError::NoPrizes
            | AppError::CouponAlreadyRedeemed
            | AppError::CouponExpired
            | AppError::OrderRequired
            | AppError::NamePhoneRequired
            | AppError::ItemsRequired
            | AppError::InvalidItems
            | AppError::InvalidPrize
            | AppError::IdRequired => StatusCode::BAD_REQUEST,

            AppError::NotFound => StatusCode::NOT_FOUND,

            AppError::CouponRaceCondition => StatusCode::CONFLICT,

            AppError::Unauthorized => StatusCode::UNAUTHORIZED,

            AppError::PrizeOutOfStock
            | AppError::DatabaseConnection
            | AppError::DatabaseOperation(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code surfaced in the response body
    pub fn code(&self) -> &'static str {
        match self {
            AppError::CodeRequired => "CODE_REQUIRED",
            AppError::InvalidCode => "INVALID_CODE",
            AppError::AlreadyUsed => "ALREADY_USED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::NoPrizes => "NO_PRIZES",
            AppError::NotFound => "NOT_FOUND",
            AppError::CouponAlreadyRedeemed => "ALREADY_REDEEMED",
            AppError::CouponExpired => "EXPIRED",
            AppError::CouponRaceCondition => "COUPON_RACE_CONDITION",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::OrderRequired => "ORDER_REQUIRED",
            AppError::NamePhoneRequired => "NAME_PHONE_REQUIRED",
            AppError::ItemsRequired => "ITEMS_REQUIRED",
            AppError::InvalidItems => "INVALID_ITEMS",
            AppError::InvalidPrize => "INVALID_PRIZE",
            AppError::IdRequired => "ID_REQUIRED",

            // Internal detail is logged, never leaked to clients.
            AppError::PrizeOutOfStock
            | AppError::DatabaseConnection
            | AppError::DatabaseOperation(_)
            | AppError::Internal(_) => "SERVER_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            eprintln!("internal error: {}", self);
        }

        let response_body = ApiResponse::<()>::error(self.code());

        (status_code, Json(response_body)).into_response()
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types
impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        AppError::DatabaseOperation(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

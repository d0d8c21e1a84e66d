pub mod error;
pub mod model;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod token;
pub mod types;
pub mod wheel;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use notify::TelegramNotifier;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use token::Secrets;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub secrets: Secrets,
    pub database_url: String,
    pub notifier: Option<Arc<TelegramNotifier>>,
}

impl AppState {
    /// Get a database connection
    pub fn get_db_connection(&self) -> Result<SqliteConnection, diesel::ConnectionError> {
        SqliteConnection::establish(&self.database_url)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::verify::verify_code,
        routes::spin::spin,
        routes::coupon::validate_coupon,
        routes::coupon::redeem_coupon,
        routes::order::create_order,
        health_check
    ),
    components(
        schemas(
            types::VerifyCodeRequest,
            types::VerifyData,
            types::SpinRequest,
            types::SpinData,
            types::PrizeSummary,
            types::CouponSummary,
            types::CouponRequest,
            types::CouponCheckData,
            types::PrizeTerms,
            types::CreateOrderRequest,
            types::OrderInput,
            types::OrderItemInput,
            types::OrderData,
            types::PrizeType,
            token::SpinToken,
            token::TokenPayload
        )
    ),
    tags(
        (name = "Wheel", description = "Promo-code verification and prize spins"),
        (name = "Coupons", description = "Coupon validation and redemption"),
        (name = "Orders", description = "Checkout with coupon discounting"),
        (name = "Health", description = "Health check endpoints")
    ),
    info(
        title = "Promo Wheel API",
        version = "1.0.0",
        description = "Spin-the-wheel promo backend: code verification, weighted prize draws, coupon redemption and checkout"
    )
)]
struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    ),
    tag = "Health"
)]
async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({"status": "ok"})))
}

async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> impl IntoResponse {
    Html(include_str!("../static/swagger.html"))
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/verify-code", post(routes::verify::verify_code))
        .route("/api/spin", post(routes::spin::spin))
        .route("/api/validate-coupon", post(routes::coupon::validate_coupon))
        .route("/api/redeem-coupon", post(routes::coupon::redeem_coupon))
        .route("/api/create-order", post(routes::order::create_order))
        .route("/api/admin/generate-codes", post(routes::admin::generate_codes))
        .route("/api/admin/codes", get(routes::admin::list_codes))
        .route(
            "/api/admin/prizes",
            get(routes::admin::list_prizes).patch(routes::admin::update_prize),
        )
        .route("/api/admin/orders", get(routes::admin::list_orders))
        .route("/api/admin/stats", get(routes::admin::stats))
        .route("/api-doc/openapi.json", get(openapi_spec))
        .route("/explore", get(swagger_ui))
        .with_state(state)
}

pub fn run() {
    tokio::runtime::Runtime::new().unwrap().block_on(async {
        // Run database migrations on startup
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "wheel.db".to_string());
        if let Err(e) = run_migrations(&database_url) {
            eprintln!("Failed to run migrations: {}", e);
            std::process::exit(1);
        }

        let secrets = match Secrets::from_env() {
            Ok(secrets) => secrets,
            Err(e) => {
                eprintln!("Failed to load signing secrets: {}", e);
                std::process::exit(1);
            }
        };

        let notifier = TelegramNotifier::from_env().map(Arc::new);
        if notifier.is_none() {
            println!("Telegram notifier not configured, order notifications disabled");
        }

        let app_state = AppState {
            secrets,
            database_url,
            notifier,
        };
        let app = app_router(app_state);

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .expect("PORT must be a valid number");

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        println!("Listening on {}", addr);

        axum::serve(
            tokio::net::TcpListener::bind(addr).await.unwrap(),
            app.into_make_service(),
        )
        .await
        .unwrap();
    });
}

pub fn run_migrations(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut connection = SqliteConnection::establish(database_url)?;
    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Migration error: {}", e))?;

    Ok(())
}

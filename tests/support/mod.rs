#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use diesel::prelude::*;
use promo_wheel::model::{Coupon, Prize, PromoCode};
use promo_wheel::token::Secrets;
use promo_wheel::types::PrizeType;
use promo_wheel::AppState;
use tower::ServiceExt; // for `oneshot`

pub const TEST_ADMIN_SECRET: &str = "test-admin-secret";

/// Per-test SQLite database with automatic file cleanup.
pub struct TestDb {
    pub path: String,
}

impl TestDb {
    pub fn new() -> Self {
        let path = format!("test_{}.db", uuid::Uuid::new_v4());
        promo_wheel::run_migrations(&path).expect("test migrations should run");
        Self { path }
    }

    pub fn conn(&self) -> SqliteConnection {
        SqliteConnection::establish(&self.path).expect("test database should open")
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn test_secrets() -> Secrets {
    Secrets {
        code_secret: "test-code-secret".to_string(),
        spin_secret: "test-spin-secret".to_string(),
        admin_secret: TEST_ADMIN_SECRET.to_string(),
    }
}

pub fn test_state(db: &TestDb) -> AppState {
    AppState {
        secrets: test_secrets(),
        database_url: db.path.clone(),
        notifier: None,
    }
}

pub fn test_app(db: &TestDb) -> Router {
    promo_wheel::app_router(test_state(db))
}

/// Insert an unused promo code for the given plaintext. Low bcrypt cost keeps
/// the suite fast.
pub fn seed_code(db: &TestDb, raw: &str) -> PromoCode {
    let secrets = test_secrets();
    let hash = bcrypt::hash(raw, 4).expect("bcrypt hash");
    let row = PromoCode::new(
        raw.to_string(),
        hash,
        secrets.code_digest(raw),
        "Test".to_string(),
    );
    diesel::insert_into(promo_wheel::schema::promo_codes::table)
        .values(&row)
        .execute(&mut db.conn())
        .expect("insert promo code");
    row
}

pub fn consume_code(db: &TestDb, promo_code_id: &str) {
    use promo_wheel::schema::promo_codes::dsl::*;
    diesel::update(promo_codes.filter(id.eq(promo_code_id)))
        .set(used_at.eq(chrono::Utc::now().naive_utc()))
        .execute(&mut db.conn())
        .expect("mark code used");
}

pub fn seed_prize(
    db: &TestDb,
    name: &str,
    prize_type: PrizeType,
    value: f64,
    weight: f64,
    stock: Option<i32>,
) -> Prize {
    let row = Prize::new(name.to_string(), prize_type, value, weight, stock, true);
    diesel::insert_into(promo_wheel::schema::prizes::table)
        .values(&row)
        .execute(&mut db.conn())
        .expect("insert prize");
    row
}

/// Insert a coupon for the prize expiring the given number of days from now
/// (negative for an already expired coupon).
pub fn seed_coupon(db: &TestDb, prize_id: &str, expires_in_days: i64) -> Coupon {
    let code = format!(
        "C-{}",
        uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
    );
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(expires_in_days)).naive_utc();
    let row = Coupon::new(code, prize_id.to_string(), expires_at, None, None);
    diesel::insert_into(promo_wheel::schema::coupons::table)
        .values(&row)
        .execute(&mut db.conn())
        .expect("insert coupon");
    row
}

pub async fn request_json(
    app: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (key, value) in headers {
        builder = builder.header(*key, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    request_json(app, "POST", uri, &[], Some(body)).await
}

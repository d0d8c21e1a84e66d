mod support;

use axum::http::StatusCode;
use diesel::prelude::*;
use promo_wheel::error::AppError;
use promo_wheel::model::Coupon;
use promo_wheel::routes::spin::{commit_spin, select_and_commit};
use promo_wheel::token::{SpinToken, TokenPayload};
use promo_wheel::types::PrizeType;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use support::*;

fn coupon_expiry() -> chrono::NaiveDateTime {
    (chrono::Utc::now() + chrono::Duration::days(365)).naive_utc()
}

fn drain_stock(db: &TestDb, prize_id: &str) {
    use promo_wheel::schema::prizes::dsl::*;
    diesel::update(prizes.filter(id.eq(prize_id)))
        .set(stock.eq(Some(0)))
        .execute(&mut db.conn())
        .unwrap();
}

#[tokio::test]
async fn full_spin_and_redeem_flow() {
    let db = TestDb::new();
    seed_code(&db, "ABCD-1234");
    seed_prize(&db, "Ten percent off", PrizeType::Percent, 10.0, 5.0, None);
    let app = test_app(&db);

    let (status, body) =
        post_json(app.clone(), "/api/verify-code", json!({"code": "ABCD-1234"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let token = body["token"].clone();
    assert!(token["payload"]["promo_code_id"].is_string());
    assert!(token["signature"].is_string());

    let (status, body) = post_json(app.clone(), "/api/spin", json!({"token": token})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["prize"]["type"], "percent");
    assert_eq!(body["prize"]["value"], 10.0);
    assert!(body["client_signature"].is_string());
    let coupon_code = body["coupon"]["code"].as_str().unwrap().to_string();
    assert!(coupon_code.starts_with("C-"));

    let (status, body) = post_json(
        app.clone(),
        "/api/redeem-coupon",
        json!({"code": coupon_code.clone(), "order_total": 500}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discount"], 50);
    assert_eq!(body["prize"]["type"], "percent");

    let (status, body) = post_json(
        app,
        "/api/redeem-coupon",
        json!({"code": coupon_code, "order_total": 500}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ALREADY_REDEEMED");
}

#[tokio::test]
async fn verify_requires_a_code() {
    let db = TestDb::new();
    let app = test_app(&db);

    let (status, body) = post_json(app.clone(), "/api/verify-code", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CODE_REQUIRED");

    let (status, body) = post_json(app, "/api/verify-code", json!({"code": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "CODE_REQUIRED");
}

#[tokio::test]
async fn verify_rejects_unknown_code() {
    let db = TestDb::new();
    seed_code(&db, "ABCD-1234");
    let app = test_app(&db);

    let (status, body) = post_json(app, "/api/verify-code", json!({"code": "WXYZ-9999"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_CODE");
}

#[tokio::test]
async fn verify_rejects_consumed_code() {
    let db = TestDb::new();
    let code = seed_code(&db, "ABCD-1234");
    consume_code(&db, &code.id);
    let app = test_app(&db);

    let (status, body) = post_json(app, "/api/verify-code", json!({"code": "ABCD-1234"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ALREADY_USED");
}

#[tokio::test]
async fn spin_token_is_single_use() {
    let db = TestDb::new();
    seed_code(&db, "ABCD-1234");
    seed_prize(&db, "Prize", PrizeType::Amount, 100.0, 1.0, None);
    let app = test_app(&db);

    let (_, body) =
        post_json(app.clone(), "/api/verify-code", json!({"code": "ABCD-1234"})).await;
    let token = body["token"].clone();

    let (status, _) = post_json(app.clone(), "/api/spin", json!({"token": token.clone()})).await;
    assert_eq!(status, StatusCode::OK);

    // Replaying the same valid token must fail: the code is consumed.
    let (status, body) = post_json(app, "/api/spin", json!({"token": token})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ALREADY_USED");
}

#[tokio::test]
async fn expired_token_rejected_despite_valid_signature() {
    let db = TestDb::new();
    let code = seed_code(&db, "ABCD-1234");
    seed_prize(&db, "Prize", PrizeType::Amount, 100.0, 1.0, None);
    let app = test_app(&db);

    let expired = SpinToken::sign(
        TokenPayload {
            promo_code_id: code.id,
            exp: chrono::Utc::now().timestamp_millis() - 1,
        },
        &test_secrets().spin_secret,
    );

    let (status, body) = post_json(app, "/api/spin", json!({"token": expired})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn token_signed_with_wrong_secret_rejected() {
    let db = TestDb::new();
    let code = seed_code(&db, "ABCD-1234");
    let app = test_app(&db);

    let forged = SpinToken::issue(code.id, "not-the-spin-secret");

    let (status, body) = post_json(app, "/api/spin", json!({"token": forged})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_TOKEN");
}

#[tokio::test]
async fn spin_without_prizes_fails() {
    let db = TestDb::new();
    seed_code(&db, "ABCD-1234");
    let app = test_app(&db);

    let (_, body) =
        post_json(app.clone(), "/api/verify-code", json!({"code": "ABCD-1234"})).await;

    let (status, body) = post_json(app, "/api/spin", json!({"token": body["token"]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NO_PRIZES");
}

#[tokio::test]
async fn spin_ignores_sold_out_prizes() {
    let db = TestDb::new();
    seed_code(&db, "ABCD-1234");
    seed_prize(&db, "Sold out", PrizeType::Amount, 500.0, 100.0, Some(0));
    let app = test_app(&db);

    let (_, body) =
        post_json(app.clone(), "/api/verify-code", json!({"code": "ABCD-1234"})).await;

    let (status, body) = post_json(app, "/api/spin", json!({"token": body["token"]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NO_PRIZES");
}

#[tokio::test]
async fn commit_rolls_back_when_last_unit_is_gone() {
    let db = TestDb::new();
    let code_one = seed_code(&db, "AAAA-1111");
    let code_two = seed_code(&db, "BBBB-2222");
    let prize = seed_prize(&db, "Last unit", PrizeType::Amount, 500.0, 1.0, Some(1));

    let expires_at = (chrono::Utc::now() + chrono::Duration::days(365)).naive_utc();
    let mut conn = db.conn();

    let first = Coupon::new("C-AAAA0001".to_string(), prize.id.clone(), expires_at, None, None);
    commit_spin(&mut conn, &code_one.id, &prize, &first).expect("first spin takes the last unit");

    let second = Coupon::new("C-BBBB0002".to_string(), prize.id.clone(), expires_at, None, None);
    let err = commit_spin(&mut conn, &code_two.id, &prize, &second)
        .expect_err("second spin must hit the stock guard");
    assert!(matches!(err, AppError::PrizeOutOfStock));

    // The failed transaction must leave no trace: the code stays unused and
    // no coupon row exists for it.
    {
        use promo_wheel::schema::promo_codes::dsl::*;
        let remaining_used_at: Option<chrono::NaiveDateTime> = promo_codes
            .filter(id.eq(&code_two.id))
            .select(used_at)
            .first(&mut conn)
            .unwrap();
        assert!(remaining_used_at.is_none());
    }
    {
        use promo_wheel::schema::coupons::dsl::*;
        let total: i64 = coupons.count().get_result(&mut conn).unwrap();
        assert_eq!(total, 1);
    }
    {
        use promo_wheel::schema::prizes::dsl::*;
        let remaining: Option<i32> = prizes
            .filter(id.eq(&prize.id))
            .select(stock)
            .first(&mut conn)
            .unwrap();
        assert_eq!(remaining, Some(0));
    }
}

#[tokio::test]
async fn stale_stock_triggers_one_reselection() {
    let db = TestDb::new();
    let code = seed_code(&db, "AAAA-1111");
    let contested = seed_prize(&db, "Contested", PrizeType::Amount, 500.0, 1_000_000.0, Some(1));
    let fallback = seed_prize(&db, "Fallback", PrizeType::Percent, 5.0, 1.0, None);

    // Snapshot loaded before a concurrent winner drains the stock: selection
    // still sees one unit, the commit guard does not.
    let snapshot = vec![contested.clone(), fallback.clone()];
    drain_stock(&db, &contested.id);

    let mut conn = db.conn();
    let mut rng = StdRng::seed_from_u64(11);
    let (awarded, coupon) = select_and_commit(
        &mut conn,
        &code.id,
        snapshot,
        &mut rng,
        coupon_expiry(),
        None,
        "sig".to_string(),
    )
    .expect("reselection should land on the remaining prize");
    assert_eq!(awarded.id, fallback.id);
    assert_eq!(coupon.prize_id, fallback.id);

    {
        use promo_wheel::schema::promo_codes::dsl::{id, promo_codes, used_at};
        let consumed: Option<chrono::NaiveDateTime> = promo_codes
            .filter(id.eq(&code.id))
            .select(used_at)
            .first(&mut conn)
            .unwrap();
        assert!(consumed.is_some());
    }
    {
        use promo_wheel::schema::coupons::dsl::*;
        let stored: Vec<String> = coupons.select(prize_id).load(&mut conn).unwrap();
        assert_eq!(stored, vec![fallback.id]);
    }
}

#[tokio::test]
async fn double_stock_exhaustion_is_fatal_and_leaves_code_unused() {
    let db = TestDb::new();
    let code = seed_code(&db, "AAAA-1111");
    let one = seed_prize(&db, "One", PrizeType::Amount, 500.0, 1.0, Some(1));
    let two = seed_prize(&db, "Two", PrizeType::Percent, 5.0, 1.0, Some(1));

    let snapshot = vec![one.clone(), two.clone()];
    drain_stock(&db, &one.id);
    drain_stock(&db, &two.id);

    let mut conn = db.conn();
    let mut rng = StdRng::seed_from_u64(12);
    let err = select_and_commit(
        &mut conn,
        &code.id,
        snapshot,
        &mut rng,
        coupon_expiry(),
        None,
        "sig".to_string(),
    )
    .expect_err("both attempts must hit the stock guard");
    assert!(matches!(err, AppError::Internal(_)));

    // Both transactions rolled back: code unused, no coupons.
    {
        use promo_wheel::schema::promo_codes::dsl::{id, promo_codes, used_at};
        let consumed: Option<chrono::NaiveDateTime> = promo_codes
            .filter(id.eq(&code.id))
            .select(used_at)
            .first(&mut conn)
            .unwrap();
        assert!(consumed.is_none());
    }
    {
        use promo_wheel::schema::coupons::dsl::*;
        let total: i64 = coupons.count().get_result(&mut conn).unwrap();
        assert_eq!(total, 0);
    }
}

#[tokio::test]
async fn empty_retry_pool_reports_no_prizes() {
    let db = TestDb::new();
    let code = seed_code(&db, "AAAA-1111");
    let only = seed_prize(&db, "Only", PrizeType::Amount, 500.0, 1.0, Some(1));

    let snapshot = vec![only.clone()];
    drain_stock(&db, &only.id);

    let mut conn = db.conn();
    let mut rng = StdRng::seed_from_u64(13);
    let err = select_and_commit(
        &mut conn,
        &code.id,
        snapshot,
        &mut rng,
        coupon_expiry(),
        None,
        "sig".to_string(),
    )
    .expect_err("nothing left to reselect from");
    assert!(matches!(err, AppError::NoPrizes));
}

#[tokio::test]
async fn sold_out_prize_is_skipped_even_with_dominant_weight() {
    let db = TestDb::new();
    seed_code(&db, "AAAA-1111");
    // The sold-out prize carries almost all the weight; the draw must still
    // land on the only eligible one.
    seed_prize(&db, "Sold out", PrizeType::Amount, 500.0, 1000.0, Some(0));
    seed_prize(&db, "Fallback", PrizeType::Percent, 5.0, 1.0, None);

    let app = test_app(&db);
    let (_, body) =
        post_json(app.clone(), "/api/verify-code", json!({"code": "AAAA-1111"})).await;

    let (status, body) = post_json(app, "/api/spin", json!({"token": body["token"]})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prize"]["name"], "Fallback");
}

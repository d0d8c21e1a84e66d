use crate::error::AppError;
use crate::model::{Order, OrderItem};
use crate::routes::coupon::{compute_discount, load_valid_coupon, mark_redeemed};
use crate::types::{ApiResponse, CreateOrderRequest, OrderData, PrizeType};
use crate::AppState;
use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use uuid::Uuid;

/// Create an order, applying an optional coupon.
///
/// The subtotal is always recomputed from the submitted line items; a
/// client-supplied total is never trusted for pricing. With a coupon, the
/// discount is computed and the coupon redeemed (conditional write) before
/// the order row is inserted. If the insert then fails the coupon stays
/// consumed; redemption and insert are deliberately not one cross-entity
/// transaction.
#[utoipa::path(
    post,
    path = "/api/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = OrderData),
        (status = 400, description = "Missing order fields or unusable coupon"),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Coupon lost a concurrent redemption race"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<OrderData>>, AppError> {
    let input = payload.order.ok_or(AppError::OrderRequired)?;
    let name = input.name.as_deref().map(str::trim).unwrap_or("");
    let phone = input.phone.as_deref().map(str::trim).unwrap_or("");
    if name.is_empty() || phone.is_empty() {
        return Err(AppError::NamePhoneRequired);
    }
    if input.items.is_empty() {
        return Err(AppError::ItemsRequired);
    }
    let payment_method = input
        .payment_method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("cod")
        .to_string();

    // Line values are stored as submitted, so negatives and overflowing
    // totals are rejected rather than clamped.
    let mut subtotal: i64 = 0;
    for item in &input.items {
        if item.price < 0 || item.quantity < 0 {
            return Err(AppError::InvalidItems);
        }
        let line = item
            .price
            .checked_mul(i64::from(item.quantity))
            .ok_or(AppError::InvalidItems)?;
        subtotal = subtotal.checked_add(line).ok_or(AppError::InvalidItems)?;
    }

    let mut conn = state
        .get_db_connection()
        .map_err(|_| AppError::DatabaseConnection)?;

    let mut discount = 0i64;
    let mut applied_coupon: Option<String> = None;
    let mut prize_terms: Option<(PrizeType, f64)> = None;

    let coupon_code = input
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    if let Some(code) = coupon_code {
        let (coupon, prize) = load_valid_coupon(&mut conn, code)?;
        discount = compute_discount(prize.prize_type, prize.value, subtotal);
        // Consume before insert; losing the race means no discount and no order.
        mark_redeemed(&mut conn, &coupon.id)?;
        applied_coupon = Some(coupon.code);
        prize_terms = Some((prize.prize_type, prize.value));
    }

    let total_amount = (subtotal - discount).max(0);

    let order = Order {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        phone: phone.to_string(),
        email: input.email.clone(),
        city: input.city.clone(),
        address: input.address.clone(),
        notes: input.notes.clone(),
        payment_method,
        subtotal,
        discount_amount: discount,
        total_amount,
        coupon_code: applied_coupon,
        prize_type: prize_terms.map(|(t, _)| t),
        prize_value: prize_terms.map(|(_, v)| v),
        created_at: chrono::Utc::now().naive_utc(),
    };

    diesel::insert_into(crate::schema::orders::table)
        .values(&order)
        .execute(&mut conn)?;

    let item_rows: Vec<OrderItem> = input
        .items
        .iter()
        .map(|i| OrderItem::new(order.id.clone(), i))
        .collect();
    diesel::insert_into(crate::schema::order_items::table)
        .values(&item_rows)
        .execute(&mut conn)?;

    if let Some(notifier) = state.notifier.clone() {
        let order = order.clone();
        tokio::spawn(async move {
            notifier.send_order(&order, &item_rows).await;
        });
    }

    Ok(Json(ApiResponse::ok(OrderData {
        order_id: order.id,
        subtotal,
        discount,
        total_amount,
    })))
}

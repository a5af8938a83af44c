//! Order route handlers.
//!
//! Every handler requires a bearer token; ownership and admin checks happen
//! in the order service.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};

use watch_shop_core::{
    CancelOrderRequest, CreateOrderRequest, IDEMPOTENCY_KEY_HEADER, OrderDetails, OrderId,
    UpdateStatusRequest, UserId,
};

use crate::db::Backend;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::routes::ApiJson;
use crate::services::orders::OrderService;
use crate::state::AppState;

fn order_service(state: &AppState) -> OrderService<'_, Backend> {
    OrderService::new(state.store())
}

fn parse_order_id(raw: &str) -> Result<OrderId> {
    OrderId::parse(raw).map_err(|_| AppError::BadRequest("Invalid order id".to_owned()))
}

/// `POST /api/orders`
///
/// 201 for a new order, 200 when an `Idempotency-Key` replays an earlier one.
pub async fn create(
    State(state): State<AppState>,
    auth: RequireAuth,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetails>)> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| AppError::BadRequest("Invalid Idempotency-Key header".to_owned()))
        })
        .transpose()?;

    let placed = order_service(&state).create(auth.caller(), req, key).await?;
    let status = if placed.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(placed.order)))
}

/// `GET /api/orders`
pub async fn list_all(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<OrderDetails>>> {
    let orders = order_service(&state).list_all(auth.caller()).await?;
    Ok(Json(orders))
}

/// `GET /api/orders/user/{user_id}`
pub async fn list_for_user(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderDetails>>> {
    let user_id =
        UserId::parse(&user_id).map_err(|_| AppError::BadRequest("Invalid user id".to_owned()))?;
    let orders = order_service(&state)
        .list_for_user(auth.caller(), user_id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{order_id}`
pub async fn show(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetails>> {
    let order_id = parse_order_id(&order_id)?;
    let order = order_service(&state).get(auth.caller(), order_id).await?;
    Ok(Json(order))
}

/// `PATCH /api/orders/{order_id}` and `PUT /api/orders/{order_id}`
pub async fn update_status(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(order_id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<OrderDetails>> {
    let order_id = parse_order_id(&order_id)?;
    let order = order_service(&state)
        .update_status(auth.caller(), order_id, req.status.as_deref())
        .await?;
    Ok(Json(order))
}

/// `POST /api/orders/{order_id}/cancel`
///
/// The body is optional; an empty body cancels without a reason.
pub async fn cancel(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(order_id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderDetails>> {
    let order_id = parse_order_id(&order_id)?;
    let req: CancelOrderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelOrderRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let order = order_service(&state)
        .cancel(auth.caller(), order_id, req.reason)
        .await?;
    Ok(Json(order))
}

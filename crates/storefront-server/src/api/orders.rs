//! Checkout, order history, payment confirmation, and status changes.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::{money, OrderStatus, PaymentMode};
use storefront_db::{OrderLineRow, OrderRow, PlacementError, StatusChange, StatusError};

use crate::middleware::{CallerIdentity, RequestId};

use super::{map_core_error, map_db_error, ApiError, ApiJson, ApiResponse, AppState};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(super) struct PlaceOrderRequest {
    #[serde(default)]
    pub defer_payment: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub restock: bool,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct PlacedOrder {
    order_id: i64,
    status: OrderStatus,
    total: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderItem {
    order_id: i64,
    status: String,
    total: Decimal,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for OrderItem {
    fn from(row: OrderRow) -> Self {
        Self {
            order_id: row.order_id,
            status: row.status,
            total: row.total,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OrderLineItem {
    pub(super) product_id: i64,
    pub(super) product_name: String,
    pub(super) quantity: i32,
    pub(super) price_at_purchase: Decimal,
    pub(super) line_total: Decimal,
}

impl From<OrderLineRow> for OrderLineItem {
    fn from(row: OrderLineRow) -> Self {
        Self {
            line_total: money::line_total(row.price_at_purchase, row.quantity),
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price_at_purchase: row.price_at_purchase,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetail {
    order_id: i64,
    status: String,
    total: Decimal,
    created_at: DateTime<Utc>,
    items: Vec<OrderLineItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusView {
    order_id: i64,
    previous_status: OrderStatus,
    status: OrderStatus,
    restocked: bool,
}

impl From<StatusChange> for StatusView {
    fn from(change: StatusChange) -> Self {
        Self {
            order_id: change.order_id,
            previous_status: change.previous,
            status: change.status,
            restocked: change.restocked,
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_placement_error(request_id: &str, error: PlacementError) -> ApiError {
    match error {
        PlacementError::EmptyCart => ApiError::new(request_id, "empty_cart", "cart is empty"),
        PlacementError::ProductNotFound(_) => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        PlacementError::InsufficientInventory { .. } => {
            ApiError::new(request_id, "insufficient_inventory", error.to_string())
        }
        PlacementError::Db(e) => map_db_error(request_id.to_owned(), &e),
    }
}

fn map_status_error(request_id: &str, error: StatusError) -> ApiError {
    match error {
        StatusError::OrderNotFound(_) => ApiError::new(request_id, "not_found", error.to_string()),
        StatusError::Forbidden { .. } | StatusError::NotAdmin => {
            ApiError::new(request_id, "forbidden", error.to_string())
        }
        StatusError::Transition(e) => map_core_error(request_id.to_owned(), &e),
        StatusError::InsufficientInventory { .. } => {
            ApiError::new(request_id, "insufficient_inventory", error.to_string())
        }
        StatusError::Db(e) => map_db_error(request_id.to_owned(), &e),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/orders: convert the caller's cart into an order.
///
/// The body is optional; `{"defer_payment": true}` creates a `pending` order
/// to be confirmed through `/pay`.
pub(super) async fn place_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<PlacedOrder>>), ApiError> {
    let request: PlaceOrderRequest = if body.iter().all(u8::is_ascii_whitespace) {
        PlaceOrderRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(
                req_id.0.clone(),
                "validation_error",
                format!("invalid request body: {e}"),
            )
        })?
    };
    let mode = if request.defer_payment {
        PaymentMode::Deferred
    } else {
        PaymentMode::Immediate
    };

    let summary = storefront_db::place_order(&state.pool, caller.user_id, mode)
        .await
        .map_err(|e| map_placement_error(&req_id.0, e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            req_id.0,
            PlacedOrder {
                order_id: summary.order_id,
                status: summary.status,
                total: summary.total,
                created_at: summary.created_at,
            },
        )),
    ))
}

/// GET /api/v1/orders: the caller's order history, newest first.
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<ApiResponse<Vec<OrderItem>>>, ApiError> {
    let rows = storefront_db::list_orders_for_user(&state.pool, caller.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        rows.into_iter().map(OrderItem::from).collect(),
    )))
}

/// GET /api/v1/orders/{order_id}: one of the caller's orders with its lines.
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let rid = &req_id.0;

    let order = storefront_db::get_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("order {order_id} not found")))?;

    if order.user_id != caller.user_id {
        return Err(ApiError::new(
            rid,
            "forbidden",
            format!("order {order_id} belongs to another user"),
        ));
    }

    let lines = storefront_db::list_order_lines(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0.clone(),
        OrderDetail {
            order_id: order.order_id,
            status: order.status,
            total: order.total,
            created_at: order.created_at,
            items: lines.into_iter().map(OrderLineItem::from).collect(),
        },
    )))
}

/// POST /api/v1/orders/{order_id}/pay: owner confirms a pending order.
pub(super) async fn pay_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<StatusView>>, ApiError> {
    let change = storefront_db::pay_order(&state.pool, order_id, caller.user_id)
        .await
        .map_err(|e| map_status_error(&req_id.0, e))?;

    Ok(Json(ApiResponse::new(req_id.0, change.into())))
}

/// PATCH /api/v1/orders/{order_id}/status: administrative status change.
pub(super) async fn update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(order_id): Path<i64>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<StatusView>>, ApiError> {
    let rid = &req_id.0;

    if !caller.is_admin() {
        return Err(map_status_error(rid, StatusError::NotAdmin));
    }
    let status: OrderStatus = body
        .status
        .trim()
        .parse()
        .map_err(|e| map_core_error(rid.clone(), &e))?;

    let change = storefront_db::set_order_status(
        &state.pool,
        order_id,
        status,
        caller.role,
        state.status_policy,
        body.restock,
    )
    .await
    .map_err(|e| map_status_error(rid, e))?;

    Ok(Json(ApiResponse::new(req_id.0.clone(), change.into())))
}

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::money;
use storefront_db::{CartError, CartLine};

use crate::middleware::{CallerIdentity, RequestId};

use super::{map_db_error, ApiError, ApiJson, ApiResponse, AppState};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct AddItemRequest {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct CartItem {
    product_id: i64,
    name: String,
    price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct CartView {
    items: Vec<CartItem>,
    subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct CartLineView {
    product_id: i64,
    quantity: i32,
}

impl From<CartLine> for CartLineView {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
        }
    }
}

fn map_cart_error(request_id: &str, error: CartError) -> ApiError {
    match error {
        CartError::InvalidQuantity(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        CartError::ProductNotFound(_) | CartError::LineNotFound(_) => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        CartError::Insufficient { .. } => {
            ApiError::new(request_id, "insufficient_inventory", error.to_string())
        }
        CartError::Db(e) => map_db_error(request_id.to_owned(), &e),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/cart: the caller's cart at current prices.
pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let rows = storefront_db::list_cart_items(&state.pool, caller.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let subtotal = money::order_total(rows.iter().map(|row| (row.price, row.quantity)));
    let items = rows
        .into_iter()
        .map(|row| CartItem {
            line_total: money::line_total(row.price, row.quantity),
            product_id: row.product_id,
            name: row.name,
            price: row.price,
            quantity: row.quantity,
        })
        .collect();

    Ok(Json(ApiResponse::new(
        req_id.0,
        CartView { items, subtotal },
    )))
}

/// POST /api/v1/cart: add units of a product, merging with an existing line.
pub(super) async fn add_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<ApiResponse<CartLineView>>, ApiError> {
    let line = storefront_db::add_to_cart(&state.pool, caller.user_id, body.product_id, body.quantity)
        .await
        .map_err(|e| map_cart_error(&req_id.0, e))?;

    Ok(Json(ApiResponse::new(req_id.0, line.into())))
}

/// PUT /api/v1/cart: set a line's quantity; zero removes it.
pub(super) async fn update_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Json<ApiResponse<CartLineView>>, ApiError> {
    let line = storefront_db::update_cart_line(
        &state.pool,
        caller.user_id,
        body.product_id,
        body.quantity,
    )
    .await
    .map_err(|e| map_cart_error(&req_id.0, e))?;

    let view = line.map_or(
        CartLineView {
            product_id: body.product_id,
            quantity: 0,
        },
        CartLineView::from,
    );
    Ok(Json(ApiResponse::new(req_id.0, view)))
}

/// DELETE /api/v1/cart/{product_id}
pub(super) async fn remove_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<CartLineView>>, ApiError> {
    storefront_db::remove_cart_line(&state.pool, caller.user_id, product_id)
        .await
        .map_err(|e| map_cart_error(&req_id.0, e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        CartLineView {
            product_id,
            quantity: 0,
        },
    )))
}

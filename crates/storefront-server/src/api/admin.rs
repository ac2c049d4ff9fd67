//! Admin-only reporting and catalog maintenance. Every handler checks the
//! caller's role before touching the database.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::TimeRange;
use storefront_db::{InventoryError, NewProduct, SalesBucket, TransactionFilters};

use crate::middleware::{CallerIdentity, RequestId};

use super::orders::OrderLineItem;
use super::{
    map_core_error, map_db_error, normalize_page, require_admin, ApiError, ApiJson, ApiResponse,
    AppState, Page,
};

const DEFAULT_TRANSACTION_PAGE_SIZE: i64 = 20;

// ---------------------------------------------------------------------------
// Query strings and request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TransactionQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserQuery {
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SetInventoryRequest {
    pub inventory: i32,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct UserCountsView {
    total: i64,
    active: i64,
    inactive: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderCountsView {
    total: i64,
    revenue_total: Decimal,
    by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct TopProductView {
    product_id: i64,
    name: String,
    quantity_sold: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct MetricsView {
    users: UserCountsView,
    orders: OrderCountsView,
    top_products: Vec<TopProductView>,
}

#[derive(Debug, Serialize)]
pub(super) struct DailySales {
    date: String,
    sales: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct MonthlySales {
    month: String,
    sales: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct RangeView {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct AnalyticsView {
    total_sales: Decimal,
    daily: Vec<DailySales>,
    monthly: Vec<MonthlySales>,
    range: RangeView,
}

#[derive(Debug, Serialize)]
pub(super) struct TransactionItem {
    order_id: i64,
    user_id: i64,
    username: String,
    status: String,
    total: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct TransactionUser {
    user_id: i64,
    username: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct TransactionDetail {
    order_id: i64,
    user: TransactionUser,
    status: String,
    total: Decimal,
    subtotal: Decimal,
    created_at: DateTime<Utc>,
    lines: Vec<OrderLineItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    user_id: i64,
    username: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct UserList {
    items: Vec<UserItem>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct CreatedProduct {
    product_id: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct InventoryView {
    product_id: i64,
    inventory: i32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_range(
    request_id: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<TimeRange, ApiError> {
    TimeRange::parse(non_blank(from), non_blank(to))
        .map_err(|e| map_core_error(request_id.to_owned(), &e))
}

/// `?active=` accepts `1|true|yes` as true; any other value means false.
fn parse_active_flag(raw: Option<&str>) -> Option<bool> {
    raw.map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn daily(buckets: Vec<SalesBucket>) -> Vec<DailySales> {
    buckets
        .into_iter()
        .map(|b| DailySales {
            date: b.period,
            sales: b.revenue,
        })
        .collect()
}

fn monthly(buckets: Vec<SalesBucket>) -> Vec<MonthlySales> {
    buckets
        .into_iter()
        .map(|b| MonthlySales {
            month: b.period,
            sales: b.revenue,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/metrics
pub(super) async fn metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<ApiResponse<MetricsView>>, ApiError> {
    require_admin(&req_id.0, &caller)?;

    let metrics = storefront_db::admin_metrics(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let view = MetricsView {
        users: UserCountsView {
            total: metrics.users.total,
            active: metrics.users.active,
            inactive: metrics.users.inactive,
        },
        orders: OrderCountsView {
            total: metrics.orders.total,
            revenue_total: metrics.orders.revenue_total,
            by_status: metrics.orders.by_status,
        },
        top_products: metrics
            .top_products
            .into_iter()
            .map(|row| TopProductView {
                product_id: row.product_id,
                name: row.name,
                quantity_sold: row.quantity_sold,
            })
            .collect(),
    };

    Ok(Json(ApiResponse::new(req_id.0, view)))
}

/// GET /api/v1/admin/analytics?from&to: realized sales by day and month.
pub(super) async fn analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ApiResponse<AnalyticsView>>, ApiError> {
    require_admin(&req_id.0, &caller)?;
    let range = parse_range(&req_id.0, query.from.as_deref(), query.to.as_deref())?;

    let report = storefront_db::sales_analytics(&state.pool, &range)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let view = AnalyticsView {
        total_sales: report.total_sales,
        daily: daily(report.daily),
        monthly: monthly(report.monthly),
        range: RangeView {
            from: report.range.from,
            to: report.range.to,
        },
    };

    Ok(Json(ApiResponse::new(req_id.0, view)))
}

/// GET /api/v1/admin/transactions: all orders, newest first.
pub(super) async fn list_transactions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<ApiResponse<Page<TransactionItem>>>, ApiError> {
    require_admin(&req_id.0, &caller)?;
    let range = parse_range(&req_id.0, query.from.as_deref(), query.to.as_deref())?;
    let (page, page_size) =
        normalize_page(query.page, query.page_size, DEFAULT_TRANSACTION_PAGE_SIZE);

    let (rows, total) = storefront_db::list_transactions(
        &state.pool,
        &TransactionFilters {
            range,
            page,
            page_size,
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let items = rows
        .into_iter()
        .map(|row| TransactionItem {
            order_id: row.order_id,
            user_id: row.user_id,
            username: row.username,
            status: row.status,
            total: row.total,
            item_count: row.item_count,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse::new(
        req_id.0,
        Page {
            items,
            total,
            page,
            page_size,
        },
    )))
}

/// GET /api/v1/admin/transactions/{order_id}: any order with buyer and lines.
pub(super) async fn get_transaction(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<TransactionDetail>>, ApiError> {
    let rid = &req_id.0;
    require_admin(rid, &caller)?;

    let order = storefront_db::get_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("order {order_id} not found")))?;

    let user = storefront_db::get_user(&state.pool, order.user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let lines: Vec<OrderLineItem> = storefront_db::list_order_lines(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .into_iter()
        .map(OrderLineItem::from)
        .collect();
    let subtotal: Decimal = lines.iter().map(|line| line.line_total).sum();

    Ok(Json(ApiResponse::new(
        req_id.0.clone(),
        TransactionDetail {
            order_id: order.order_id,
            user: TransactionUser {
                user_id: order.user_id,
                username: user.map(|u| u.username),
            },
            status: order.status,
            total: order.total,
            subtotal,
            created_at: order.created_at,
            lines,
        },
    )))
}

/// GET /api/v1/admin/users?active=
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<UserList>>, ApiError> {
    require_admin(&req_id.0, &caller)?;

    let rows = storefront_db::list_users(&state.pool, parse_active_flag(query.active.as_deref()))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let items: Vec<UserItem> = rows
        .into_iter()
        .map(|row| UserItem {
            user_id: row.user_id,
            username: row.username,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
        })
        .collect();
    let count = items.len();

    Ok(Json(ApiResponse::new(req_id.0, UserList { items, count })))
}

// ---------------------------------------------------------------------------
// Catalog maintenance
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    ApiJson(body): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedProduct>>), ApiError> {
    let rid = &req_id.0;
    require_admin(rid, &caller)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(rid, "validation_error", "name is required"));
    }
    if body.price.is_sign_negative() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "price must not be negative",
        ));
    }
    if body.inventory < 0 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "inventory must not be negative",
        ));
    }

    let product_id = storefront_db::create_product(
        &state.pool,
        &NewProduct {
            name,
            description: body.description.as_deref(),
            price: body.price,
            inventory: body.inventory,
            image_url: body.image_url.as_deref().filter(|u| !u.trim().is_empty()),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(req_id.0.clone(), CreatedProduct { product_id })),
    ))
}

/// PATCH /api/v1/admin/products/{product_id}/inventory: absolute overwrite.
pub(super) async fn set_inventory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(product_id): Path<i64>,
    ApiJson(body): ApiJson<SetInventoryRequest>,
) -> Result<Json<ApiResponse<InventoryView>>, ApiError> {
    let rid = &req_id.0;
    require_admin(rid, &caller)?;

    storefront_db::inventory::set_absolute(&state.pool, product_id, body.inventory)
        .await
        .map_err(|e| match e {
            InventoryError::InvalidQuantity(_) => {
                ApiError::new(rid, "validation_error", "inventory must not be negative")
            }
            InventoryError::ProductNotFound(_) => {
                ApiError::new(rid, "not_found", format!("product {product_id} not found"))
            }
            InventoryError::Insufficient { .. } => {
                ApiError::new(rid, "insufficient_inventory", e.to_string())
            }
            InventoryError::Db(e) => map_db_error(rid.clone(), &e),
        })?;

    Ok(Json(ApiResponse::new(
        req_id.0.clone(),
        InventoryView {
            product_id,
            inventory: body.inventory,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_flag_accepts_truthy_spellings() {
        assert_eq!(parse_active_flag(Some("TRUE")), Some(true));
        assert_eq!(parse_active_flag(Some("1")), Some(true));
        assert_eq!(parse_active_flag(Some("no")), Some(false));
        assert_eq!(parse_active_flag(None), None);
    }

    #[test]
    fn blank_range_bounds_are_open() {
        let range = parse_range("req", Some(""), Some("  ")).expect("blank bounds");
        assert_eq!(range, TimeRange::default());
    }

    #[test]
    fn malformed_range_is_a_validation_error() {
        let err = parse_range("req", Some("last tuesday"), None).unwrap_err();
        assert_eq!(err.error.code, "validation_error");
    }
}

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_db::{ProductDetailRow, ProductListFilters, ProductSort};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_page, ApiError, ApiResponse, AppState, Page};

const DEFAULT_PAGE_SIZE: i64 = 12;

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    product_id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    inventory: i32,
    image_url: Option<String>,
    rating: f64,
    rating_count: i64,
    popularity: i32,
}

impl From<ProductDetailRow> for ProductItem {
    fn from(row: ProductDetailRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            description: row.description,
            price: row.price,
            inventory: row.inventory,
            image_url: row.image_url,
            rating: row.rating,
            rating_count: row.rating_count,
            popularity: row.popularity,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    category_id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<i64>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// GET /api/v1/products: search, filter, sort, and paginate the catalog.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Page<ProductItem>>>, ApiError> {
    let (page, page_size) = normalize_page(query.page, query.page_size, DEFAULT_PAGE_SIZE);
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let (rows, total) = storefront_db::list_products(
        &state.pool,
        &ProductListFilters {
            q: search,
            category_id: query.category_id,
            sort: query.sort.as_deref().and_then(ProductSort::parse),
            page,
            page_size,
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        Page {
            items: rows.into_iter().map(ProductItem::from).collect(),
            total,
            page,
            page_size,
        },
    )))
}

/// GET /api/v1/products/{product_id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let row = storefront_db::get_product_detail(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("product {product_id} not found"),
            )
        })?;

    Ok(Json(ApiResponse::new(req_id.0, ProductItem::from(row))))
}

/// GET /api/v1/categories
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = storefront_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| CategoryItem {
            category_id: row.category_id,
            name: row.name,
        })
        .collect();

    Ok(Json(ApiResponse::new(req_id.0, data)))
}

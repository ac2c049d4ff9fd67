use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use storefront_core::{RatingSummary, RatingValue};
use storefront_db::RatingError;

use crate::middleware::{CallerIdentity, RequestId};

use super::{map_core_error, map_db_error, ApiError, ApiJson, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct RateRequest {
    pub rating: i64,
}

/// POST /api/v1/products/{product_id}/rate: fold one 1-5 rating into the
/// product's running mean.
pub(super) async fn rate_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
    Path(product_id): Path<i64>,
    ApiJson(body): ApiJson<RateRequest>,
) -> Result<Json<ApiResponse<RatingSummary>>, ApiError> {
    let value =
        RatingValue::try_from(body.rating).map_err(|e| map_core_error(req_id.0.clone(), &e))?;

    let summary = storefront_db::submit_rating(&state.pool, product_id, value)
        .await
        .map_err(|e| match e {
            RatingError::ProductNotFound(id) => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("product {id} not found"),
            ),
            RatingError::Db(e) => map_db_error(req_id.0.clone(), &e),
        })?;

    tracing::debug!(user_id = caller.user_id, product_id, "rating submitted");
    Ok(Json(ApiResponse::new(req_id.0, summary)))
}

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use storefront_db::DbError;

use crate::middleware::{CallerIdentity, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct DeactivatedView {
    user_id: i64,
    is_active: bool,
}

/// POST /api/v1/account/deactivate: the caller deactivates their own account.
/// Order history is kept.
pub(super) async fn deactivate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<ApiResponse<DeactivatedView>>, ApiError> {
    storefront_db::deactivate_user(&state.pool, caller.user_id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("user {} not found", caller.user_id),
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        DeactivatedView {
            user_id: caller.user_id,
            is_active: false,
        },
    )))
}

mod account;
mod admin;
mod cart;
mod catalog;
mod orders;
mod ratings;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use storefront_core::{Caller, CoreError, StatusPolicy};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub status_policy: StatusPolicy,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

/// One page of a listing plus the unpaged match count.
#[derive(Debug, Serialize)]
pub(super) struct Page<T: Serialize> {
    items: Vec<T>,
    total: i64,
    page: i64,
    page_size: i64,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" | "empty_cart" => StatusCode::BAD_REQUEST,
            "conflict" | "insufficient_inventory" | "invalid_state" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// JSON request body whose rejections (bad content type, malformed or
/// mistyped JSON) come back as a `validation_error` envelope.
#[derive(Debug)]
pub(super) struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_default();

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection_error(request_id, &rejection)),
        }
    }
}

fn json_rejection_error(request_id: String, rejection: &JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection.body_text(), "request body rejected");
    ApiError::new(request_id, "validation_error", rejection.body_text())
}

/// Clamp 1-based `page`/`page_size` query values.
pub(super) fn normalize_page(
    page: Option<i64>,
    page_size: Option<i64>,
    default_size: i64,
) -> (i64, i64) {
    (
        page.unwrap_or(1).max(1),
        page_size.unwrap_or(default_size).clamp(1, 100),
    )
}

pub(super) fn map_db_error(request_id: String, error: &storefront_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Maps domain-rule failures from `storefront_core` to client errors.
pub(super) fn map_core_error(request_id: String, error: &CoreError) -> ApiError {
    match error {
        CoreError::IllegalTransition { .. } => {
            ApiError::new(request_id, "invalid_state", error.to_string())
        }
        CoreError::InvalidStatus(_)
        | CoreError::InvalidRole(_)
        | CoreError::InvalidRating(_)
        | CoreError::InvalidTimestamp { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
    }
}

pub(super) fn require_admin(request_id: &str, caller: &Caller) -> Result<(), ApiError> {
    if caller.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = caller.user_id, "admin route refused for non-admin caller");
        Err(ApiError::new(
            request_id,
            "forbidden",
            "admin privilege required",
        ))
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-role"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/products", get(catalog::list_products))
        .route("/api/v1/products/{product_id}", get(catalog::get_product))
        .route(
            "/api/v1/products/{product_id}/rate",
            post(ratings::rate_product),
        )
        .route("/api/v1/categories", get(catalog::list_categories))
        .route(
            "/api/v1/cart",
            get(cart::get_cart)
                .post(cart::add_item)
                .put(cart::update_item),
        )
        .route("/api/v1/cart/{product_id}", delete(cart::remove_item))
        .route(
            "/api/v1/orders",
            get(orders::list_orders).post(orders::place_order),
        )
        .route("/api/v1/orders/{order_id}", get(orders::get_order))
        .route("/api/v1/orders/{order_id}/pay", post(orders::pay_order))
        .route(
            "/api/v1/orders/{order_id}/status",
            patch(orders::update_status),
        )
        .route("/api/v1/account/deactivate", post(account::deactivate))
        .route("/api/v1/admin/metrics", get(admin::metrics))
        .route("/api/v1/admin/analytics", get(admin::analytics))
        .route("/api/v1/admin/transactions", get(admin::list_transactions))
        .route(
            "/api/v1/admin/transactions/{order_id}",
            get(admin::get_transaction),
        )
        .route("/api/v1/admin/users", get(admin::list_users))
        .route("/api/v1/admin/products", post(admin::create_product))
        .route(
            "/api/v1/admin/products/{product_id}/inventory",
            patch(admin::set_inventory),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match storefront_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

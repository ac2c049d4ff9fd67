pub mod analytics;
pub mod app_config;
pub mod catalog;
pub mod config;
pub mod identity;
pub mod money;
pub mod orders;
pub mod ratings;

use thiserror::Error;

pub use analytics::{Granularity, TimeRange, TOP_SELLER_LIMIT};
pub use app_config::{AppConfig, Environment};
pub use catalog::{load_catalog, CatalogFile, ProductSeed, UserSeed};
pub use config::{load_app_config, load_app_config_from_env};
pub use identity::{Caller, Role};
pub use orders::{OrderStatus, PaymentMode, StatusPolicy};
pub use ratings::{RatingSummary, RatingValue};

/// Validation and business-rule failures that need no I/O to detect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid order status: '{0}'")]
    InvalidStatus(String),
    #[error("invalid role: '{0}'")]
    InvalidRole(String),
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),
    #[error("invalid {field} timestamp: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("illegal status transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[source] serde_yaml::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

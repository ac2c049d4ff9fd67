//! Running-mean rating aggregation on `product_meta`.

use sqlx::PgPool;
use storefront_core::{RatingSummary, RatingValue};
use thiserror::Error;

use crate::DbError;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for RatingError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

#[derive(sqlx::FromRow)]
struct MetaRow {
    rating: f64,
    rating_count: i64,
}

/// Folds one rating into the product's running mean and returns the result.
///
/// The meta row is created on first use and locked for the read-compute-write,
/// so concurrent submissions for one product apply one at a time and none is
/// lost.
///
/// # Errors
///
/// Returns [`RatingError::ProductNotFound`] for unknown products or
/// [`RatingError::Db`] if a statement fails.
pub async fn submit_rating(
    pool: &PgPool,
    product_id: i64,
    value: RatingValue,
) -> Result<RatingSummary, RatingError> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> =
        sqlx::query_scalar("SELECT product_id FROM products WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
    if exists.is_none() {
        return Err(RatingError::ProductNotFound(product_id));
    }

    sqlx::query(
        "INSERT INTO product_meta (product_id) VALUES ($1) \
         ON CONFLICT (product_id) DO NOTHING",
    )
    .bind(product_id)
    .execute(&mut *tx)
    .await?;

    let current = sqlx::query_as::<_, MetaRow>(
        "SELECT rating, rating_count FROM product_meta WHERE product_id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_one(&mut *tx)
    .await?;

    let summary = RatingSummary {
        rating: current.rating,
        rating_count: current.rating_count,
    }
    .with_sample(value);

    sqlx::query("UPDATE product_meta SET rating = $2, rating_count = $3 WHERE product_id = $1")
        .bind(product_id)
        .bind(summary.rating)
        .bind(summary.rating_count)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        product_id,
        value = value.get(),
        rating = summary.rating,
        rating_count = summary.rating_count,
        "rating recorded"
    );
    Ok(summary)
}

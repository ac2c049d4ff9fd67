//! Inventory ledger: per-product available quantity on `products.inventory`.
//!
//! `reserve` and `credit` take a connection so callers can run them inside
//! their own transaction; the reservation is a single conditional `UPDATE`,
//! so no other transaction can observe the check apart from the decrement.

use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use crate::DbError;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(
        "insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    Insufficient {
        product_id: i64,
        requested: i32,
        available: i32,
    },
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

/// Atomically decrements `quantity` units if at least that many are available.
///
/// # Errors
///
/// Returns [`InventoryError::Insufficient`] when stock is short (nothing is
/// changed), [`InventoryError::ProductNotFound`] for unknown ids,
/// [`InventoryError::InvalidQuantity`] for non-positive quantities, or
/// [`InventoryError::Db`] if a statement fails.
pub async fn reserve(
    conn: &mut PgConnection,
    product_id: i64,
    quantity: i32,
) -> Result<(), InventoryError> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(quantity));
    }

    let remaining: Option<i32> = sqlx::query_scalar(
        "UPDATE products \
         SET inventory = inventory - $2 \
         WHERE product_id = $1 AND inventory >= $2 \
         RETURNING inventory",
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    if remaining.is_some() {
        return Ok(());
    }

    let available: Option<i32> =
        sqlx::query_scalar("SELECT inventory FROM products WHERE product_id = $1")
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

    match available {
        Some(available) => Err(InventoryError::Insufficient {
            product_id,
            requested: quantity,
            available,
        }),
        None => Err(InventoryError::ProductNotFound(product_id)),
    }
}

/// Returns `quantity` units to stock, reversing an earlier reservation.
///
/// # Errors
///
/// Returns [`InventoryError::ProductNotFound`] for unknown ids,
/// [`InventoryError::InvalidQuantity`] for non-positive quantities, or
/// [`InventoryError::Db`] if the update fails.
pub async fn credit(
    conn: &mut PgConnection,
    product_id: i64,
    quantity: i32,
) -> Result<(), InventoryError> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(quantity));
    }

    let result = sqlx::query(
        "UPDATE products SET inventory = inventory + $2 WHERE product_id = $1",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(InventoryError::ProductNotFound(product_id));
    }

    Ok(())
}

/// Admin override: overwrites the available quantity. Last writer wins.
///
/// # Errors
///
/// Returns [`InventoryError::InvalidQuantity`] for negative values,
/// [`InventoryError::ProductNotFound`] for unknown ids, or
/// [`InventoryError::Db`] if the update fails.
pub async fn set_absolute(
    pool: &PgPool,
    product_id: i64,
    quantity: i32,
) -> Result<(), InventoryError> {
    if quantity < 0 {
        return Err(InventoryError::InvalidQuantity(quantity));
    }

    let result = sqlx::query("UPDATE products SET inventory = $2 WHERE product_id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(InventoryError::ProductNotFound(product_id));
    }

    tracing::info!(product_id, inventory = quantity, "inventory overwritten");
    Ok(())
}

/// Current available quantity for a product.
///
/// # Errors
///
/// Returns [`InventoryError::ProductNotFound`] for unknown ids or
/// [`InventoryError::Db`] if the query fails.
pub async fn available(pool: &PgPool, product_id: i64) -> Result<i32, InventoryError> {
    sqlx::query_scalar::<_, i32>("SELECT inventory FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or(InventoryError::ProductNotFound(product_id))
}

//! Per-user cart lines.
//!
//! `snapshot` and `clear` are the pieces checkout runs inside its own
//! transaction; the rest is request-level CRUD.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use crate::{catalog, DbError};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error("product {0} is not in the cart")]
    LineNotFound(i64),
    #[error(
        "insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    Insufficient {
        product_id: i64,
        requested: i32,
        available: i32,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct CartLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// A cart line joined with the product's current name and price.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow {
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub inventory: i32,
}

// ---------------------------------------------------------------------------
// Checkout collaborators
// ---------------------------------------------------------------------------

/// Reads and row-locks the user's cart, ascending by product id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn snapshot(conn: &mut PgConnection, user_id: i64) -> Result<Vec<CartLine>, DbError> {
    let lines = sqlx::query_as::<_, CartLine>(
        "SELECT product_id, quantity \
         FROM cart \
         WHERE user_id = $1 \
         ORDER BY product_id \
         FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Deletes the given products' lines from the user's cart. Returns the number
/// removed. Checkout passes the snapshotted ids, so a line added after the
/// snapshot stays in the cart.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn clear(
    conn: &mut PgConnection,
    user_id: i64,
    product_ids: &[i64],
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM cart WHERE user_id = $1 AND product_id = ANY($2)")
        .bind(user_id)
        .bind(product_ids)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Request-level operations
// ---------------------------------------------------------------------------

/// Lists the user's cart with current product names and prices.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cart_items(pool: &PgPool, user_id: i64) -> Result<Vec<CartItemRow>, DbError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT c.product_id, p.name, p.price, c.quantity, p.inventory \
         FROM cart c \
         JOIN products p ON p.product_id = c.product_id \
         WHERE c.user_id = $1 \
         ORDER BY c.product_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Adds `quantity` units to the user's cart, merging with an existing line.
///
/// The merge and the inventory bound are one statement, so concurrent adds of
/// the same product sum instead of overwriting each other. The bound is a
/// courtesy check only; checkout re-validates under row locks.
///
/// # Errors
///
/// Returns [`CartError::InvalidQuantity`] for quantities below 1,
/// [`CartError::ProductNotFound`] for unknown products,
/// [`CartError::Insufficient`] when stock is short, or [`CartError::Db`].
pub async fn add_to_cart(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<CartLine, CartError> {
    if quantity < 1 {
        return Err(CartError::InvalidQuantity(quantity));
    }

    let line = sqlx::query_as::<_, CartLine>(
        "INSERT INTO cart (user_id, product_id, quantity) \
         SELECT $1, p.product_id, $3 \
         FROM products p \
         WHERE p.product_id = $2 AND p.inventory >= $3 \
         ON CONFLICT (user_id, product_id) \
         DO UPDATE SET quantity = cart.quantity + EXCLUDED.quantity \
         WHERE cart.quantity + EXCLUDED.quantity <= \
               (SELECT inventory FROM products WHERE product_id = $2) \
         RETURNING product_id, quantity",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?;

    if let Some(line) = line {
        return Ok(line);
    }

    let mut conn = pool.acquire().await?;
    let inventory = product_inventory(&mut *conn, product_id).await?;
    let existing: i32 = sqlx::query_scalar(
        "SELECT quantity FROM cart WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .unwrap_or(0);

    tracing::debug!(user_id, product_id, quantity, inventory, "cart add rejected");
    Err(CartError::Insufficient {
        product_id,
        requested: existing.saturating_add(quantity),
        available: inventory,
    })
}

/// Sets a line's quantity. Zero removes the line and returns `None`.
///
/// # Errors
///
/// Returns [`CartError::InvalidQuantity`] for negative quantities,
/// [`CartError::ProductNotFound`] for unknown products,
/// [`CartError::LineNotFound`] when the product is not in the cart,
/// [`CartError::Insufficient`] when stock is short, or [`CartError::Db`].
pub async fn update_cart_line(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<Option<CartLine>, CartError> {
    if quantity < 0 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    if quantity == 0 {
        remove_cart_line(pool, user_id, product_id).await?;
        return Ok(None);
    }

    let mut tx = pool.begin().await?;

    let inventory = product_inventory(&mut *tx, product_id).await?;
    if quantity > inventory {
        return Err(CartError::Insufficient {
            product_id,
            requested: quantity,
            available: inventory,
        });
    }

    let line = sqlx::query_as::<_, CartLine>(
        "UPDATE cart SET quantity = $3 \
         WHERE user_id = $1 AND product_id = $2 \
         RETURNING product_id, quantity",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(CartError::LineNotFound(product_id))?;

    tx.commit().await?;
    Ok(Some(line))
}

/// Removes one line from the user's cart.
///
/// # Errors
///
/// Returns [`CartError::LineNotFound`] when the product is not in the cart, or
/// [`CartError::Db`] if the delete fails.
pub async fn remove_cart_line(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
) -> Result<(), CartError> {
    let result = sqlx::query("DELETE FROM cart WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CartError::LineNotFound(product_id));
    }

    Ok(())
}

async fn product_inventory(conn: &mut PgConnection, product_id: i64) -> Result<i32, CartError> {
    catalog::get_product(conn, product_id)
        .await?
        .map(|product| product.inventory)
        .ok_or(CartError::ProductNotFound(product_id))
}

//! Order placement, status changes, and the order read side.
//!
//! Checkout converts a cart into an order inside one transaction: cart rows
//! and product rows are locked, stock is reserved line by line, and any
//! failure drops the transaction so nothing persists.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use storefront_core::orders::pay_transition;
use storefront_core::{money, CoreError, OrderStatus, PaymentMode, Role, StatusPolicy, TimeRange};
use thiserror::Error;

use crate::inventory::{self, InventoryError};
use crate::{cart, catalog, page_window, DbError};

const MAX_TRANSACTION_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("product {0} not found")]
    ProductNotFound(i64),
    #[error(
        "insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        product_id: i64,
        requested: i32,
        available: i32,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for PlacementError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

impl From<InventoryError> for PlacementError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::Insufficient {
                product_id,
                requested,
                available,
            } => Self::InsufficientInventory {
                product_id,
                requested,
                available,
            },
            InventoryError::ProductNotFound(id) => Self::ProductNotFound(id),
            InventoryError::InvalidQuantity(quantity) => Self::Db(DbError::InvalidColumn {
                column: "cart.quantity",
                value: quantity.to_string(),
            }),
            InventoryError::Db(e) => Self::Db(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("order {0} not found")]
    OrderNotFound(i64),
    #[error("order {order_id} belongs to another user")]
    Forbidden { order_id: i64 },
    #[error("only admins may change order status")]
    NotAdmin,
    #[error(transparent)]
    Transition(CoreError),
    #[error(
        "cannot reopen order: insufficient inventory for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientInventory {
        product_id: i64,
        requested: i32,
        available: i32,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for StatusError {
    fn from(e: sqlx::Error) -> Self {
        Self::Db(DbError::Sqlx(e))
    }
}

impl From<InventoryError> for StatusError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::Insufficient {
                product_id,
                requested,
                available,
            } => Self::InsufficientInventory {
                product_id,
                requested,
                available,
            },
            InventoryError::Db(e) => Self::Db(e),
            other => Self::Db(DbError::InvalidColumn {
                column: "order_items",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// What checkout hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_id: i64,
    pub status: OrderStatus,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub order_id: i64,
    pub user_id: i64,
    pub status: String,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderRow {
    /// Parses the stored status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if the column holds an unknown value.
    pub fn status(&self) -> Result<OrderStatus, DbError> {
        parse_status(&self.status)
    }
}

/// One order line with the unit price captured at checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderLineRow {
    pub order_item_id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

/// Result of a payment confirmation or an administrative status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: i64,
    pub previous: OrderStatus,
    pub status: OrderStatus,
    pub restocked: bool,
}

/// Admin transaction listing filters. `page` is 1-based.
#[derive(Debug, Clone, Copy)]
pub struct TransactionFilters {
    pub range: TimeRange,
    pub page: i64,
    pub page_size: i64,
}

impl Default for TransactionFilters {
    fn default() -> Self {
        Self {
            range: TimeRange::default(),
            page: 1,
            page_size: 20,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRow {
    pub order_id: i64,
    pub user_id: i64,
    pub username: String,
    pub status: String,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}

#[derive(sqlx::FromRow)]
struct LockedOrder {
    user_id: i64,
    status: String,
    restocked: bool,
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Converts the user's cart into an order.
///
/// Every step runs in one transaction: lock the cart, lock the referenced
/// products in ascending id order, reserve stock for each line, insert the
/// order and its lines at the captured prices, clear the cart, commit. A
/// second concurrent checkout of the same cart waits on the cart locks and
/// then sees an empty cart.
///
/// # Errors
///
/// Returns [`PlacementError::EmptyCart`], [`PlacementError::ProductNotFound`],
/// or [`PlacementError::InsufficientInventory`] for business-rule failures
/// (nothing is persisted), or [`PlacementError::Db`] if a statement fails.
pub async fn place_order(
    pool: &PgPool,
    user_id: i64,
    mode: PaymentMode,
) -> Result<OrderSummary, PlacementError> {
    let mut tx = pool.begin().await?;

    let lines = cart::snapshot(&mut *tx, user_id).await?;
    if lines.is_empty() {
        tracing::debug!(user_id, "checkout rejected: empty cart");
        return Err(PlacementError::EmptyCart);
    }

    let mut product_ids: Vec<i64> = lines.iter().map(|line| line.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let prices: BTreeMap<i64, Decimal> = catalog::lock_products(&mut *tx, &product_ids)
        .await?
        .into_iter()
        .map(|product| (product.product_id, product.price))
        .collect();

    let mut captured = Vec::with_capacity(lines.len());
    for line in &lines {
        let price = prices
            .get(&line.product_id)
            .copied()
            .ok_or(PlacementError::ProductNotFound(line.product_id))?;
        captured.push((line.product_id, line.quantity, price));
    }
    captured.sort_unstable_by_key(|(product_id, _, _)| *product_id);

    for &(product_id, quantity, _) in &captured {
        if let Err(e) = inventory::reserve(&mut *tx, product_id, quantity).await {
            tracing::debug!(user_id, product_id, quantity, error = %e, "checkout rejected");
            return Err(e.into());
        }
    }

    let total = money::order_total(captured.iter().map(|&(_, quantity, price)| (price, quantity)));
    let status = mode.initial_status();

    let (order_id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
        "INSERT INTO orders (user_id, status, total) \
         VALUES ($1, $2, $3) \
         RETURNING order_id, created_at",
    )
    .bind(user_id)
    .bind(status.as_str())
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    for &(product_id, quantity, price) in &captured {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    }

    cart::clear(&mut *tx, user_id, &product_ids).await?;
    tx.commit().await?;

    tracing::info!(
        order_id,
        user_id,
        status = %status,
        total = %total,
        lines = captured.len(),
        "order placed"
    );

    Ok(OrderSummary {
        order_id,
        status,
        total,
        created_at,
    })
}

// ---------------------------------------------------------------------------
// Status changes
// ---------------------------------------------------------------------------

/// Owner-initiated payment confirmation for a deferred-payment order.
///
/// # Errors
///
/// Returns [`StatusError::OrderNotFound`], [`StatusError::Forbidden`] when the
/// caller does not own the order, [`StatusError::Transition`] unless the order
/// is `pending`, or [`StatusError::Db`].
pub async fn pay_order(
    pool: &PgPool,
    order_id: i64,
    user_id: i64,
) -> Result<StatusChange, StatusError> {
    let mut tx = pool.begin().await?;

    let locked = lock_order(&mut tx, order_id).await?;
    if locked.user_id != user_id {
        tracing::warn!(order_id, user_id, "payment rejected: caller is not the owner");
        return Err(StatusError::Forbidden { order_id });
    }

    let previous = parse_status(&locked.status)?;
    let status = pay_transition(previous).map_err(StatusError::Transition)?;

    write_status(&mut tx, order_id, status).await?;
    tx.commit().await?;

    tracing::info!(order_id, user_id, "order paid");
    Ok(StatusChange {
        order_id,
        previous,
        status,
        restocked: false,
    })
}

/// Administrative status change.
///
/// The role check runs before anything is read. `policy` decides which
/// transitions are legal. With `restock`, moving an order into `cancelled`
/// credits every line back to stock in the same transaction and flags the
/// order as restocked. A restocked order that leaves `cancelled` reserves its
/// lines again, so an order's units are held at most once.
///
/// # Errors
///
/// Returns [`StatusError::NotAdmin`], [`StatusError::OrderNotFound`],
/// [`StatusError::Transition`] when the policy rejects the change,
/// [`StatusError::InsufficientInventory`] when a restocked order cannot be
/// reopened, or [`StatusError::Db`].
pub async fn set_order_status(
    pool: &PgPool,
    order_id: i64,
    new_status: OrderStatus,
    caller_role: Role,
    policy: StatusPolicy,
    restock: bool,
) -> Result<StatusChange, StatusError> {
    if caller_role != Role::Admin {
        return Err(StatusError::NotAdmin);
    }

    let mut tx = pool.begin().await?;

    let locked = lock_order(&mut tx, order_id).await?;
    let previous = parse_status(&locked.status)?;
    policy
        .check(previous, new_status)
        .map_err(StatusError::Transition)?;

    let restocked = restock && new_status == OrderStatus::Cancelled && !locked.restocked;
    let reopened = locked.restocked && new_status != OrderStatus::Cancelled;

    if restocked {
        for (product_id, quantity) in order_lines_by_product(&mut tx, order_id).await? {
            inventory::credit(&mut *tx, product_id, quantity).await?;
        }
    } else if reopened {
        for (product_id, quantity) in order_lines_by_product(&mut tx, order_id).await? {
            if let Err(e) = inventory::reserve(&mut *tx, product_id, quantity).await {
                tracing::debug!(order_id, product_id, quantity, error = %e, "reopen rejected");
                return Err(e.into());
            }
        }
    }

    sqlx::query("UPDATE orders SET status = $2, restocked = $3 WHERE order_id = $1")
        .bind(order_id)
        .bind(new_status.as_str())
        .bind(new_status == OrderStatus::Cancelled && (restocked || locked.restocked))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        order_id,
        from = %previous,
        to = %new_status,
        restocked,
        reopened,
        "order status changed"
    );
    Ok(StatusChange {
        order_id,
        previous,
        status: new_status,
        restocked,
    })
}

async fn lock_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: i64,
) -> Result<LockedOrder, StatusError> {
    sqlx::query_as::<_, LockedOrder>(
        "SELECT user_id, status, restocked FROM orders WHERE order_id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(StatusError::OrderNotFound(order_id))
}

/// Line quantities summed per product, in ascending id order to match the
/// checkout lock order.
async fn order_lines_by_product(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: i64,
) -> Result<Vec<(i64, i32)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT product_id, SUM(quantity)::INTEGER \
         FROM order_items \
         WHERE order_id = $1 \
         GROUP BY product_id \
         ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await
}

async fn write_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: i64,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = $2 WHERE order_id = $1")
        .bind(order_id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn parse_status(raw: &str) -> Result<OrderStatus, DbError> {
    raw.parse::<OrderStatus>()
        .map_err(|_| DbError::InvalidColumn {
            column: "orders.status",
            value: raw.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Returns the user's orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<OrderRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT order_id, user_id, status, total, created_at \
         FROM orders \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, order_id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single order regardless of owner; callers enforce visibility.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, order_id: i64) -> Result<Option<OrderRow>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT order_id, user_id, status, total, created_at \
         FROM orders \
         WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns an order's lines with product names, ascending by product id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_lines(pool: &PgPool, order_id: i64) -> Result<Vec<OrderLineRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderLineRow>(
        "SELECT oi.order_item_id, oi.order_id, oi.product_id, \
                p.name AS product_name, oi.quantity, oi.price_at_purchase \
         FROM order_items oi \
         JOIN products p ON p.product_id = oi.product_id \
         WHERE oi.order_id = $1 \
         ORDER BY oi.product_id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns one page of all orders, newest first, plus the total count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_transactions(
    pool: &PgPool,
    filters: &TransactionFilters,
) -> Result<(Vec<TransactionRow>, i64), DbError> {
    let (limit, offset) = page_window(filters.page, filters.page_size, MAX_TRANSACTION_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) \
         FROM orders o \
         WHERE ($1::TIMESTAMPTZ IS NULL OR o.created_at >= $1) \
           AND ($2::TIMESTAMPTZ IS NULL OR o.created_at <= $2)",
    )
    .bind(filters.range.from)
    .bind(filters.range.to)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT o.order_id, o.user_id, u.username, o.status, o.total, o.created_at, \
                COALESCE(SUM(oi.quantity), 0)::BIGINT AS item_count \
         FROM orders o \
         JOIN users u ON u.user_id = o.user_id \
         LEFT JOIN order_items oi ON oi.order_id = o.order_id \
         WHERE ($1::TIMESTAMPTZ IS NULL OR o.created_at >= $1) \
           AND ($2::TIMESTAMPTZ IS NULL OR o.created_at <= $2) \
         GROUP BY o.order_id, u.username \
         ORDER BY o.created_at DESC, o.order_id DESC \
         LIMIT $3 OFFSET $4",
    )
    .bind(filters.range.from)
    .bind(filters.range.to)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

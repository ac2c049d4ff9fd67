//! Read-only reporting over orders: admin metrics and the sales time series.
//!
//! Revenue counts realized orders only (`paid`, `shipped`, `delivered`).
//! Each report runs in a single `REPEATABLE READ READ ONLY` transaction so its
//! sub-queries see one snapshot.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use storefront_core::{Granularity, OrderStatus, TimeRange, TOP_SELLER_LIMIT};

use crate::DbError;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCounts {
    pub total: i64,
    pub revenue_total: Decimal,
    /// Every status is present, zero when no order has it.
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TopProductRow {
    pub product_id: i64,
    pub name: String,
    pub quantity_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminMetrics {
    pub users: UserCounts,
    pub orders: OrderCounts,
    pub top_products: Vec<TopProductRow>,
}

/// Realized revenue for one calendar bucket (`YYYY-MM-DD` or `YYYY-MM`, UTC).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SalesBucket {
    pub period: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesAnalytics {
    pub total_sales: Decimal,
    pub daily: Vec<SalesBucket>,
    pub monthly: Vec<SalesBucket>,
    pub range: TimeRange,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// User and order counts, realized revenue, and the top sellers by quantity.
///
/// Ties in the top-seller ranking are broken by ascending product id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn admin_metrics(pool: &PgPool) -> Result<AdminMetrics, DbError> {
    let mut tx = pool.begin().await?;
    snapshot_read_only(&mut tx).await?;

    let users = sqlx::query_as::<_, UserCounts>(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE is_active) AS active, \
                COUNT(*) FILTER (WHERE NOT is_active) AS inactive \
         FROM users",
    )
    .fetch_one(&mut *tx)
    .await?;

    let order_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&mut *tx)
        .await?;

    let revenue_total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total), 0) FROM orders WHERE status = ANY($1::TEXT[])",
    )
    .bind(OrderStatus::realized_names())
    .fetch_one(&mut *tx)
    .await?;

    let counted: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
            .fetch_all(&mut *tx)
            .await?;

    let top_products = sqlx::query_as::<_, TopProductRow>(
        "SELECT oi.product_id, p.name, SUM(oi.quantity)::BIGINT AS quantity_sold \
         FROM order_items oi \
         JOIN orders o ON o.order_id = oi.order_id \
         JOIN products p ON p.product_id = oi.product_id \
         WHERE o.status = ANY($1::TEXT[]) \
         GROUP BY oi.product_id, p.name \
         ORDER BY quantity_sold DESC, oi.product_id ASC \
         LIMIT $2",
    )
    .bind(OrderStatus::realized_names())
    .bind(TOP_SELLER_LIMIT)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(AdminMetrics {
        users,
        orders: OrderCounts {
            total: order_total,
            revenue_total,
            by_status: zero_filled_statuses(counted),
        },
        top_products,
    })
}

/// Realized revenue in `range`, as a total and as daily and monthly buckets.
///
/// Buckets with no realized revenue are omitted, so the series are sparse.
/// An inverted range simply matches nothing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn sales_analytics(pool: &PgPool, range: &TimeRange) -> Result<SalesAnalytics, DbError> {
    let mut tx = pool.begin().await?;
    snapshot_read_only(&mut tx).await?;

    let total_sales: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total), 0) \
         FROM orders \
         WHERE status = ANY($1::TEXT[]) \
           AND ($2::TIMESTAMPTZ IS NULL OR created_at >= $2) \
           AND ($3::TIMESTAMPTZ IS NULL OR created_at <= $3)",
    )
    .bind(OrderStatus::realized_names())
    .bind(range.from)
    .bind(range.to)
    .fetch_one(&mut *tx)
    .await?;

    let daily = sales_buckets(&mut tx, Granularity::Day, range).await?;
    let monthly = sales_buckets(&mut tx, Granularity::Month, range).await?;

    tx.commit().await?;

    Ok(SalesAnalytics {
        total_sales,
        daily,
        monthly,
        range: *range,
    })
}

async fn sales_buckets(
    conn: &mut PgConnection,
    granularity: Granularity,
    range: &TimeRange,
) -> Result<Vec<SalesBucket>, DbError> {
    let rows = sqlx::query_as::<_, SalesBucket>(
        "SELECT to_char(created_at AT TIME ZONE 'UTC', $1) AS period, \
                SUM(total) AS revenue \
         FROM orders \
         WHERE status = ANY($2::TEXT[]) \
           AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3) \
           AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4) \
         GROUP BY period \
         HAVING SUM(total) > 0 \
         ORDER BY period",
    )
    .bind(granularity.pg_format())
    .bind(OrderStatus::realized_names())
    .bind(range.from)
    .bind(range.to)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

async fn snapshot_read_only(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn zero_filled_statuses(counted: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut by_status: BTreeMap<String, i64> = OrderStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for (status, count) in counted {
        by_status.insert(status, count);
    }
    by_status
}

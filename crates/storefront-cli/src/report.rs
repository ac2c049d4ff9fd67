//! `report` subcommands: the admin dashboard figures rendered as plain text.

use clap::Subcommand;
use rust_decimal::Decimal;
use storefront_core::TimeRange;

#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// User counts, order counts by status, realized revenue, top sellers
    Metrics,
    /// Realized sales bucketed by day and month
    Analytics {
        /// Start of the range (ISO-8601 date or datetime, inclusive)
        #[arg(long)]
        from: Option<String>,
        /// End of the range; a bare date covers the whole day
        #[arg(long)]
        to: Option<String>,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: ReportCommands) -> anyhow::Result<()> {
    match command {
        ReportCommands::Metrics => run_metrics(pool).await,
        ReportCommands::Analytics { from, to } => {
            let range = TimeRange::parse(from.as_deref(), to.as_deref())?;
            run_analytics(pool, &range).await
        }
    }
}

fn fmt_money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

async fn run_metrics(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let metrics = storefront_db::admin_metrics(pool).await?;

    println!(
        "users: {} total, {} active, {} inactive",
        metrics.users.total, metrics.users.active, metrics.users.inactive
    );
    println!(
        "orders: {} total, realized revenue {}",
        metrics.orders.total,
        fmt_money(metrics.orders.revenue_total)
    );
    for (status, count) in &metrics.orders.by_status {
        println!("  {status:<10}{count:>8}");
    }

    if metrics.top_products.is_empty() {
        println!("no realized sales yet");
        return Ok(());
    }

    println!();
    println!("{:<8}{:<40}{:>8}", "ID", "PRODUCT", "SOLD");
    for row in &metrics.top_products {
        let name = if row.name.chars().count() > 38 {
            format!("{}...", row.name.chars().take(35).collect::<String>())
        } else {
            row.name.clone()
        };
        println!("{:<8}{:<40}{:>8}", row.product_id, name, row.quantity_sold);
    }

    Ok(())
}

async fn run_analytics(pool: &sqlx::PgPool, range: &TimeRange) -> anyhow::Result<()> {
    let report = storefront_db::sales_analytics(pool, range).await?;

    println!("total sales: {}", fmt_money(report.total_sales));
    if report.daily.is_empty() {
        println!("no realized sales in range");
        return Ok(());
    }

    println!();
    println!("{:<12}{:>14}", "DATE", "SALES");
    for bucket in &report.daily {
        println!("{:<12}{:>14}", bucket.period, fmt_money(bucket.revenue));
    }

    println!();
    println!("{:<12}{:>14}", "MONTH", "SALES");
    for bucket in &report.monthly {
        println!("{:<12}{:>14}", bucket.period, fmt_money(bucket.revenue));
    }

    Ok(())
}

mod report;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use report::ReportCommands;

#[derive(Debug, Parser)]
#[command(name = "storefront-cli")]
#[command(about = "Storefront operations: database maintenance and sales reports")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Admin reports printed to stdout
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Verify the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load categories, products, and users from the catalog seed file
    Seed {
        /// Seed file to load (defaults to `STOREFRONT_CATALOG_PATH`)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("storefront-cli: pass --help to list commands");
        return Ok(());
    };

    let config = storefront_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = storefront_db::PoolConfig::from_app_config(&config);
    let pool = storefront_db::connect_pool(&config.database_url, pool_config).await?;
    tracing::debug!(max_connections = pool_config.max_connections, "database pool ready");

    match command {
        Commands::Db { command } => run_db(&pool, &config, command).await,
        Commands::Report { command } => report::run(&pool, command).await,
    }
}

/// The seed file to load: the `--path` argument when given, otherwise the
/// configured default.
fn seed_path(explicit: Option<PathBuf>, configured: &Path) -> PathBuf {
    explicit.unwrap_or_else(|| configured.to_path_buf())
}

async fn run_db(
    pool: &sqlx::PgPool,
    config: &storefront_core::AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            storefront_db::health_check(pool).await?;
            tracing::info!("database reachable");
            println!("database ok");
        }
        DbCommands::Migrate => {
            tracing::info!("applying migrations");
            let applied = storefront_db::run_migrations(pool).await?;
            tracing::info!(applied, "migrations complete");
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed { path } => {
            let path = seed_path(path, &config.catalog_path);
            tracing::info!(path = %path.display(), "loading catalog seed");
            let catalog = storefront_core::load_catalog(&path)?;
            storefront_db::run_migrations(pool).await?;
            let summary = storefront_db::seed_catalog(pool, &catalog).await?;
            tracing::info!(
                categories = summary.categories,
                inserted = summary.products_inserted,
                updated = summary.products_updated,
                users = summary.users,
                "catalog seeded"
            );
            println!(
                "seeded {}: {} categories, {} products inserted, {} updated, {} users",
                path.display(),
                summary.categories,
                summary.products_inserted,
                summary.products_updated,
                summary.users
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;

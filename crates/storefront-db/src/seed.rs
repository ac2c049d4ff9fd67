use std::collections::HashMap;

use sqlx::PgPool;
use storefront_core::CatalogFile;

use crate::DbError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products_inserted: usize,
    pub products_updated: usize,
    pub users: usize,
}

/// Upsert a demo catalog: categories, products with meta and category links,
/// and users.
///
/// Products are matched by case-insensitive name; a match has its price,
/// stock, and description overwritten. All writes run in one transaction; if
/// any fails the whole seed is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(pool: &PgPool, catalog: &CatalogFile) -> Result<SeedSummary, DbError> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();
    let mut category_ids: HashMap<&str, i64> = HashMap::new();

    for name in &catalog.categories {
        let category_id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING category_id",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        category_ids.insert(name.as_str(), category_id);
        summary.categories += 1;
    }

    for product in &catalog.products {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT product_id FROM products \
             WHERE LOWER(name) = LOWER($1) \
             ORDER BY product_id \
             LIMIT 1",
        )
        .bind(&product.name)
        .fetch_optional(&mut *tx)
        .await?;

        let product_id = if let Some(product_id) = existing {
            sqlx::query(
                "UPDATE products \
                 SET description = $2, price = $3, inventory = $4 \
                 WHERE product_id = $1",
            )
            .bind(product_id)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.inventory)
            .execute(&mut *tx)
            .await?;
            summary.products_updated += 1;
            product_id
        } else {
            let product_id: i64 = sqlx::query_scalar(
                "INSERT INTO products (name, description, price, inventory) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING product_id",
            )
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.inventory)
            .fetch_one(&mut *tx)
            .await?;
            summary.products_inserted += 1;
            product_id
        };

        if let Some(image_url) = &product.image_url {
            sqlx::query(
                "INSERT INTO product_meta (product_id, image_url) VALUES ($1, $2) \
                 ON CONFLICT (product_id) DO UPDATE SET image_url = EXCLUDED.image_url",
            )
            .bind(product_id)
            .bind(image_url)
            .execute(&mut *tx)
            .await?;
        }

        for category in &product.categories {
            let Some(&category_id) = category_ids.get(category.as_str()) else {
                continue;
            };
            sqlx::query(
                "INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(product_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    for user in &catalog.users {
        sqlx::query(
            "INSERT INTO users (username, role) VALUES ($1, $2) \
             ON CONFLICT (username) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(&user.username)
        .bind(user.role.as_str())
        .execute(&mut *tx)
        .await?;
        summary.users += 1;
    }

    tx.commit().await?;
    tracing::info!(
        categories = summary.categories,
        products_inserted = summary.products_inserted,
        products_updated = summary.products_updated,
        users = summary.users,
        "catalog seeded"
    );
    Ok(summary)
}

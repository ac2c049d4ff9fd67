//! Database operations for `products`, `product_meta`, and `categories`.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::{page_window, DbError};

const MAX_PAGE_SIZE: i64 = 100;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Price and stock for one product; what checkout needs from the catalog.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub product_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory: i32,
}

/// A product joined with its optional meta row. Products that were never
/// rated report a zero rating and count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductDetailRow {
    pub product_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub inventory: i32,
    pub image_url: Option<String>,
    pub rating: f64,
    pub rating_count: i64,
    pub popularity: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub category_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Rating,
    Popularity,
}

impl ProductSort {
    /// Parses the `sort` query value; unknown values fall back to id order.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "price_asc" => Some(Self::PriceAsc),
            "price_desc" => Some(Self::PriceDesc),
            "rating" => Some(Self::Rating),
            "popularity" => Some(Self::Popularity),
            _ => None,
        }
    }

    fn order_by(sort: Option<Self>) -> &'static str {
        match sort {
            Some(Self::PriceAsc) => "p.price ASC, p.product_id ASC",
            Some(Self::PriceDesc) => "p.price DESC, p.product_id ASC",
            Some(Self::Rating) => "COALESCE(m.rating, 0) DESC, p.product_id ASC",
            Some(Self::Popularity) => "COALESCE(m.popularity, 0) DESC, p.product_id ASC",
            None => "p.product_id ASC",
        }
    }
}

/// Input filters for the catalog listing. `page` is 1-based.
#[derive(Debug, Clone)]
pub struct ProductListFilters<'a> {
    pub q: Option<&'a str>,
    pub category_id: Option<i64>,
    pub sort: Option<ProductSort>,
    pub page: i64,
    pub page_size: i64,
}

impl Default for ProductListFilters<'_> {
    fn default() -> Self {
        Self {
            q: None,
            category_id: None,
            sort: None,
            page: 1,
            page_size: 12,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub inventory: i32,
    pub image_url: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Looks up a product's price and stock.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(
    conn: &mut PgConnection,
    product_id: i64,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT product_id, name, description, price, inventory \
         FROM products \
         WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

/// Fetches and row-locks the given products, ascending by id.
///
/// Every transaction that locks several products goes through here, so locks
/// are always taken in the same order. Ids that do not resolve are simply
/// absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lock_products(
    conn: &mut PgConnection,
    product_ids: &[i64],
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT product_id, name, description, price, inventory \
         FROM products \
         WHERE product_id = ANY($1) \
         ORDER BY product_id \
         FOR UPDATE",
    )
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Returns one page of products plus the total number of matches.
///
/// `q` is a case-insensitive substring match over name and description.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: &ProductListFilters<'_>,
) -> Result<(Vec<ProductDetailRow>, i64), DbError> {
    let pattern = filters.q.map(|q| format!("%{}%", escape_like(q)));
    let (limit, offset) = page_window(filters.page, filters.page_size, MAX_PAGE_SIZE);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) \
         FROM products p \
         WHERE ($1::TEXT IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1) \
           AND ($2::BIGINT IS NULL OR EXISTS ( \
                SELECT 1 FROM product_categories pc \
                WHERE pc.product_id = p.product_id AND pc.category_id = $2))",
    )
    .bind(pattern.as_deref())
    .bind(filters.category_id)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT p.product_id, p.name, p.description, p.price, p.inventory, \
                m.image_url, \
                COALESCE(m.rating, 0) AS rating, \
                COALESCE(m.rating_count, 0) AS rating_count, \
                COALESCE(m.popularity, 0) AS popularity \
         FROM products p \
         LEFT JOIN product_meta m ON m.product_id = p.product_id \
         WHERE ($1::TEXT IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1) \
           AND ($2::BIGINT IS NULL OR EXISTS ( \
                SELECT 1 FROM product_categories pc \
                WHERE pc.product_id = p.product_id AND pc.category_id = $2)) \
         ORDER BY {} \
         LIMIT $3 OFFSET $4",
        ProductSort::order_by(filters.sort)
    );

    let rows = sqlx::query_as::<_, ProductDetailRow>(&sql)
        .bind(pattern.as_deref())
        .bind(filters.category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

/// Returns a single product with its meta, if it exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_detail(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<ProductDetailRow>, DbError> {
    let row = sqlx::query_as::<_, ProductDetailRow>(
        "SELECT p.product_id, p.name, p.description, p.price, p.inventory, \
                m.image_url, \
                COALESCE(m.rating, 0) AS rating, \
                COALESCE(m.rating_count, 0) AS rating_count, \
                COALESCE(m.popularity, 0) AS popularity \
         FROM products p \
         LEFT JOIN product_meta m ON m.product_id = p.product_id \
         WHERE p.product_id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all categories ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT category_id, name FROM categories ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Inserts a product, plus a meta row when an image URL is supplied.
///
/// Both inserts run in one transaction. Returns the new `product_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert fails (for example a negative
/// price or inventory rejected by the table checks).
pub async fn create_product(pool: &PgPool, product: &NewProduct<'_>) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, description, price, inventory) \
         VALUES ($1, $2, $3, $4) \
         RETURNING product_id",
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.price)
    .bind(product.inventory)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(image_url) = product.image_url {
        sqlx::query("INSERT INTO product_meta (product_id, image_url) VALUES ($1, $2)")
            .bind(product_id)
            .bind(image_url)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::info!(product_id, name = product.name, "product created");
    Ok(product_id)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use storefront_core::Role;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    /// Parses the stored role.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if the column holds an unknown value.
    pub fn role(&self) -> Result<Role, DbError> {
        self.role.parse().map_err(|_| DbError::InvalidColumn {
            column: "users.role",
            value: self.role.clone(),
        })
    }
}

/// Inserts a user and returns the new `user_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate
/// username).
pub async fn create_user(pool: &PgPool, username: &str, role: Role) -> Result<i64, DbError> {
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, role) VALUES ($1, $2) RETURNING user_id",
    )
    .bind(username)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;

    Ok(user_id)
}

/// Looks up a single user by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT user_id, username, role, is_active, created_at FROM users WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Marks a user inactive. Orders and history are kept.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no user has this id, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn deactivate_user(pool: &PgPool, user_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    tracing::info!(user_id, "user deactivated");
    Ok(())
}

/// Lists users ordered by id, optionally only active or only inactive ones.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool, active: Option<bool>) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT user_id, username, role, is_active, created_at \
         FROM users \
         WHERE ($1::BOOLEAN IS NULL OR is_active = $1) \
         ORDER BY user_id",
    )
    .bind(active)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

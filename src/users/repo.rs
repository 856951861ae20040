use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::users::repo_types::UserRow;

const COLUMNS: &str = "id, username, password_hash, date_joined, biography";

/// Returns `true` when the error is a unique-constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

impl UserRow {
    /// Insert a new user with an already hashed password.
    pub async fn insert(
        db: &PgPool,
        username: &str,
        password_hash: &str,
        date_joined: OffsetDateTime,
    ) -> anyhow::Result<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, password_hash, date_joined)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(username)
        .bind(password_hash)
        .bind(date_joined)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(row)
    }

    /// Find a user by username.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(row)
    }

    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<UserRow>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY date_joined ASC"
        ))
        .fetch_all(db)
        .await
        .context("list users")?;
        Ok(rows)
    }

    /// Apply a partial update; `None` columns keep their value.
    pub async fn update(
        db: &PgPool,
        username: &str,
        password_hash: Option<&str>,
        biography: Option<&str>,
    ) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET password_hash = COALESCE($2, password_hash),
                   biography = COALESCE($3, biography)
             WHERE username = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(username)
        .bind(password_hash)
        .bind(biography)
        .fetch_optional(db)
        .await
        .context("update user")?;
        Ok(row)
    }

    pub async fn delete_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "DELETE FROM users WHERE username = $1 RETURNING {COLUMNS}"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("delete user")?;
        Ok(row)
    }
}

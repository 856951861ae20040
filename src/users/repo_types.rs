use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::dto::SafeUser;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,                    // unique user ID
    pub username: String,            // unique login name
    pub password_hash: String,       // Argon2 hash, never leaves the service
    pub date_joined: OffsetDateTime, // set by the caller at signup
    pub biography: Option<String>,
}

impl From<UserRow> for SafeUser {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            date_joined: r.date_joined,
            biography: r.biography,
        }
    }
}

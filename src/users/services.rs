use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::users::{
    dto::{NewUser, SafeUser, UserUpdate},
    password::{hash_password, verify_password},
    repo::is_unique_violation,
    repo_types::UserRow,
};

/// Error reported by a user service in place of a user.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("user not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username already taken")]
    UsernameTaken,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Persistence operations behind the `/user` routes.
#[async_trait]
pub trait UserService: Send + Sync {
    async fn create(&self, user: NewUser) -> ServiceResult<SafeUser>;
    async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<SafeUser>;
    async fn update(&self, username: &str, update: UserUpdate) -> ServiceResult<SafeUser>;
    async fn find(&self, username: &str) -> ServiceResult<SafeUser>;
    async fn list(&self) -> ServiceResult<Vec<SafeUser>>;
    async fn delete(&self, username: &str) -> ServiceResult<SafeUser>;
}

pub(crate) fn hash(plain: &str) -> ServiceResult<String> {
    hash_password(plain).map_err(|e| ServiceError::Hash(e.to_string()))
}

/// Checks a password against a stored hash. A hash that fails to parse
/// counts as a mismatch.
pub(crate) fn check(plain: &str, stored: &str) -> ServiceResult<()> {
    match verify_password(plain, stored) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(ServiceError::InvalidCredentials),
    }
}

#[derive(Clone)]
pub struct PgUserService {
    db: PgPool,
}

impl PgUserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserService for PgUserService {
    async fn create(&self, user: NewUser) -> ServiceResult<SafeUser> {
        let hashed = hash(&user.password)?;
        let row = UserRow::insert(&self.db, &user.username, &hashed, user.date_joined)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::UsernameTaken
                } else {
                    ServiceError::Storage(e)
                }
            })?;
        info!(user_id = %row.id, username = %row.username, "user created");
        Ok(row.into())
    }

    async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<SafeUser> {
        let row = UserRow::find_by_username(&self.db, username)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or(ServiceError::InvalidCredentials)?;
        check(password, &row.password_hash)?;
        debug!(user_id = %row.id, "credentials verified");
        Ok(row.into())
    }

    async fn update(&self, username: &str, update: UserUpdate) -> ServiceResult<SafeUser> {
        let hashed = update.password.as_deref().map(hash).transpose()?;
        let row = UserRow::update(
            &self.db,
            username,
            hashed.as_deref(),
            update.biography.as_deref(),
        )
        .await
        .map_err(ServiceError::Storage)?
        .ok_or(ServiceError::NotFound)?;
        Ok(row.into())
    }

    async fn find(&self, username: &str) -> ServiceResult<SafeUser> {
        UserRow::find_by_username(&self.db, username)
            .await
            .map_err(ServiceError::Storage)?
            .map(SafeUser::from)
            .ok_or(ServiceError::NotFound)
    }

    async fn list(&self) -> ServiceResult<Vec<SafeUser>> {
        let rows = UserRow::list(&self.db).await.map_err(ServiceError::Storage)?;
        Ok(rows.into_iter().map(SafeUser::from).collect())
    }

    async fn delete(&self, username: &str) -> ServiceResult<SafeUser> {
        let row = UserRow::delete_by_username(&self.db, username)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or(ServiceError::NotFound)?;
        info!(user_id = %row.id, username = %row.username, "user deleted");
        Ok(row.into())
    }
}

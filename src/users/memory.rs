use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    dto::{NewUser, SafeUser, UserUpdate},
    repo_types::UserRow,
    services::{check, hash, ServiceError, ServiceResult, UserService},
};

/// In-process user store for running without Postgres.
#[derive(Default)]
pub struct MemoryUserService {
    users: RwLock<BTreeMap<String, UserRow>>,
}

impl MemoryUserService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserService for MemoryUserService {
    async fn create(&self, user: NewUser) -> ServiceResult<SafeUser> {
        let hashed = hash(&user.password)?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(ServiceError::UsernameTaken);
        }
        let row = UserRow {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            password_hash: hashed,
            date_joined: user.date_joined,
            biography: None,
        };
        users.insert(user.username, row.clone());
        Ok(row.into())
    }

    async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<SafeUser> {
        let users = self.users.read().await;
        let row = users.get(username).ok_or(ServiceError::InvalidCredentials)?;
        check(password, &row.password_hash)?;
        Ok(row.clone().into())
    }

    async fn update(&self, username: &str, update: UserUpdate) -> ServiceResult<SafeUser> {
        let hashed = update.password.as_deref().map(hash).transpose()?;
        let mut users = self.users.write().await;
        let row = users.get_mut(username).ok_or(ServiceError::NotFound)?;
        if let Some(h) = hashed {
            row.password_hash = h;
        }
        if let Some(b) = update.biography {
            row.biography = Some(b);
        }
        Ok(row.clone().into())
    }

    async fn find(&self, username: &str) -> ServiceResult<SafeUser> {
        self.users
            .read()
            .await
            .get(username)
            .cloned()
            .map(SafeUser::from)
            .ok_or(ServiceError::NotFound)
    }

    async fn list(&self) -> ServiceResult<Vec<SafeUser>> {
        let mut rows: Vec<UserRow> = self.users.read().await.values().cloned().collect();
        rows.sort_by_key(|r| r.date_joined);
        Ok(rows.into_iter().map(SafeUser::from).collect())
    }

    async fn delete(&self, username: &str) -> ServiceResult<SafeUser> {
        self.users
            .write()
            .await
            .remove(username)
            .map(SafeUser::from)
            .ok_or(ServiceError::NotFound)
    }
}

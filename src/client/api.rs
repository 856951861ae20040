use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::users::SafeUser;

/// Remote operations the auth form calls.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> anyhow::Result<SafeUser>;
    async fn signup(&self, username: &str, password: &str) -> anyhow::Result<SafeUser>;
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// `AuthApi` over HTTP against the `/user` routes.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> anyhow::Result<SafeUser> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .http
            .post(&url)
            .json(&Credentials { username, password })
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(%status, %url, "auth request rejected");
            if text.is_empty() {
                anyhow::bail!("request failed with status {status}");
            }
            anyhow::bail!(text);
        }

        let user = res
            .json::<SafeUser>()
            .await
            .with_context(|| format!("decode user from {url}"))?;
        debug!(username = %user.username, %url, "auth request succeeded");
        Ok(user)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, username: &str, password: &str) -> anyhow::Result<SafeUser> {
        self.post_credentials("/user/login", username, password).await
    }

    async fn signup(&self, username: &str, password: &str) -> anyhow::Result<SafeUser> {
        self.post_credentials("/user/signup", username, password).await
    }
}

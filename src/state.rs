use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::config::{AppConfig, StoreKind};
use crate::users::{MemoryUserService, PgUserService, UserService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserService>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let users: Arc<dyn UserService> = match (&config.store, &config.db) {
            (StoreKind::Postgres, Some(db_cfg)) => {
                let db = PgPoolOptions::new()
                    .max_connections(db_cfg.max_connections)
                    .connect(&db_cfg.url)
                    .await
                    .context("connect to database")?;

                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!("using postgres user store");
                Arc::new(PgUserService::new(db))
            }
            (StoreKind::Postgres, None) => anyhow::bail!("postgres store configured without database settings"),
            (StoreKind::Memory, _) => {
                warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserService::new())
            }
        };

        Ok(Self::from_parts(Arc::new(config), users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserService>) -> Self {
        Self { config, users }
    }

    /// State backed by the in-memory store with default listen settings.
    pub fn in_memory() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreKind::Memory,
            db: None,
        });
        Self::from_parts(config, Arc::new(MemoryUserService::new()))
    }
}

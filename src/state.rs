use std::sync::Arc;

use sqlx::PgPool;

use crate::accounts::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};
use crate::auth::{memory::MemorySessionStore, session::PgSessionStore, session::SessionStore};
use crate::config::{AppConfig, StorageBackend};
use crate::db;

/// Handles every request needs. Built once at startup and cloned into
/// handlers by axum; there is no other shared state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    db: Option<PgPool>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        match config.backend {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pool = db::connect(url, config.max_connections).await?;
                db::migrate(&pool).await;
                let users = Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>;
                let sessions = Arc::new(PgSessionStore::new(pool.clone())) as Arc<dyn SessionStore>;
                Ok(Self {
                    config,
                    users,
                    sessions,
                    db: Some(pool),
                })
            }
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage; data is lost on restart");
                Ok(Self::from_parts(
                    config,
                    Arc::new(MemoryUserStore::new()),
                    Arc::new(MemorySessionStore::new()),
                ))
            }
        }
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            users,
            sessions,
            db: None,
        }
    }

    /// Release the connection pool, if any. Safe to call more than once.
    pub async fn close(&self) {
        if let Some(pool) = &self.db {
            pool.close().await;
            tracing::info!("database pool closed");
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
            session: crate::config::SessionConfig {
                cookie_secure: false,
                ..crate::config::SessionConfig::default()
            },
        });
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemorySessionStore::new()),
        )
    }
}

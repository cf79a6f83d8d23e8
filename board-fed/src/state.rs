//! Application state management

use std::sync::Arc;

use dashmap::DashMap;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::ap::Actor;
use crate::captcha_pool::CaptchaPool;
use crate::config::Config;
use crate::error::Result;
use crate::hooks::HookRegistry;

/// Application state shared across handlers.
///
/// Mirrors the host framework's `AppState`: an `Arc` over the storage pool plus the
/// handful of long-lived collaborators every handler may need — the WebFinger actor
/// cache, the compiled content-filter set, the CAPTCHA pool, the hook registry and the
/// outbound HTTP client.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: Arc<RwLock<Option<SqlitePool>>>,
    actor_cache: Arc<DashMap<String, Actor>>,
    filters: Arc<RwLock<Vec<regex::Regex>>>,
    captcha_pool: Arc<CaptchaPool>,
    hooks: Arc<HookRegistry>,
    http_client: reqwest::Client,
}

impl AppState {
    /// Create a new builder for AppState.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The storage pool, if connected. SqlitePool is internally `Arc`-backed so
    /// cloning is cheap.
    pub async fn pool(&self) -> Option<SqlitePool> {
        self.pool.read().await.clone()
    }

    pub fn pool_lock(&self) -> &Arc<RwLock<Option<SqlitePool>>> {
        &self.pool
    }

    pub fn actor_cache(&self) -> &DashMap<String, Actor> {
        &self.actor_cache
    }

    pub async fn filters(&self) -> Vec<regex::Regex> {
        self.filters.read().await.clone()
    }

    /// Re-read the content-filter set from storage and replace the in-memory copy.
    /// Single writer (this call, serialized by the lock), many readers
    /// (`ingest::local::submit`, `federation::inbox::handle_create`).
    pub async fn refresh_filters(&self) -> Result<()> {
        let Some(pool) = self.pool().await else { return Ok(()) };
        let compiled = crate::storage::regexps::compiled_filters(&pool).await?;
        *self.filters.write().await = compiled;
        Ok(())
    }

    pub fn captcha_pool(&self) -> &CaptchaPool {
        &self.captcha_pool
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    config: Option<Config>,
    enable_tracing: bool,
    pool: Option<SqlitePool>,
    lazy_pool: bool,
}

impl AppStateBuilder {
    /// Create a new builder with sensible defaults: config loaded from the environment
    /// if not provided, tracing auto-initialized, pool connected eagerly.
    pub fn new() -> Self {
        Self {
            config: None,
            enable_tracing: true,
            pool: None,
            lazy_pool: false,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Provide an already-open pool (tests typically pass an in-memory one here).
    pub fn pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Connect the storage pool in the background instead of blocking `build()`.
    pub fn lazy_pool(mut self) -> Self {
        self.lazy_pool = true;
        self
    }

    /// Disable automatic tracing initialization. Tests build many `AppState`s in one
    /// process and must not re-install a global subscriber.
    pub fn without_tracing(mut self) -> Self {
        self.enable_tracing = false;
        self
    }

    /// Build the `AppState`, connecting the storage pool and running the schema
    /// upgrade loop unless a pool was supplied explicitly.
    pub async fn build(self) -> Result<AppState> {
        let config = match self.config {
            Some(c) => c,
            None => Config::load()?,
        };

        if self.enable_tracing {
            crate::observability::init_tracing(&config);
        }

        let pool = if let Some(pool) = self.pool {
            Arc::new(RwLock::new(Some(pool)))
        } else {
            let path = config.storage.path.clone();
            if self.lazy_pool {
                let lock = Arc::new(RwLock::new(None));
                let lock_clone = lock.clone();
                tokio::spawn(async move {
                    match create_pool(&path).await {
                        Ok(pool) => {
                            if let Err(e) = crate::storage::schema::upgrade(&pool).await {
                                tracing::error!(error = %e, "schema upgrade failed");
                                return;
                            }
                            *lock_clone.write().await = Some(pool);
                            tracing::info!("storage pool connected (lazy)");
                        }
                        Err(e) => tracing::error!(error = %e, "lazy storage connection failed"),
                    }
                });
                lock
            } else {
                let pool = create_pool(&path).await?;
                crate::storage::schema::upgrade(&pool).await?;
                Arc::new(RwLock::new(Some(pool)))
            }
        };

        let http_client = crate::transport::build_client(&config.federation)?;

        let state = AppState {
            config: Arc::new(config),
            pool,
            actor_cache: Arc::new(DashMap::new()),
            filters: Arc::new(RwLock::new(Vec::new())),
            captcha_pool: Arc::new(CaptchaPool::new()),
            hooks: Arc::new(HookRegistry::new()),
            http_client,
        };

        if state.pool().await.is_some() {
            state.refresh_filters().await?;
        }

        Ok(state)
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open (and create, if absent) the single-writer SQLite pool the whole process shares.
async fn create_pool(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);

    // The storage engine is single-writer by design: one connection serializes every
    // mutation, matching the upstream dynamic-table engine's locking model.
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_connects_in_memory_pool() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::storage::schema::upgrade(&pool).await.unwrap();

        let state = AppState::builder()
            .config(Config::default())
            .pool(pool)
            .without_tracing()
            .build()
            .await
            .unwrap();

        assert!(state.pool().await.is_some());
        assert_eq!(state.config().service.transport, "https");
    }
}

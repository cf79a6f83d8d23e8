//! # board-fed
//!
//! A federated text-only message board server: ActivityPub interop (actor documents,
//! WebFinger, signed inbox/outbox, fan-out) layered over a per-board dynamic-table
//! SQLite storage engine and a local/federated post-ingest pipeline.
//!
//! ## Example
//!
//! ```rust,no_run
//! use board_fed::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config);
//!
//!     let state = AppState::builder().config(config.clone()).build().await?;
//!     let app = routes::router(state);
//!
//!     Server::new(config).serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod ap;
pub mod captcha_pool;
pub mod config;
pub mod crypto;
pub mod error;
pub mod federation;
pub mod health;
pub mod hooks;
pub mod ids;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod server;
pub mod state;
pub mod storage;
pub mod transform;
pub mod transport;
pub mod webfinger;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ap::{Actor, LinkOrObject, Object, PublicKey, StringOrList};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::health::{health, readiness};
    pub use crate::ids::{MakeTypedRequestId, RequestId, RequestIdError};
    pub use crate::models::{Board, Post, ReplyEdge};
    pub use crate::observability::init_tracing;
    pub use crate::routes::router;
    pub use crate::server::Server;
    pub use crate::state::{AppState, AppStateBuilder};

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{get, post},
        Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, instrument, trace, warn};
    pub use tokio;
    pub use async_trait::async_trait;
    pub use thiserror::Error;
    pub use anyhow::{self, Context as AnyhowContext};
    pub use chrono::{DateTime, Duration as ChronoDuration, Utc};
    pub use futures::{future, stream, Future, Stream, StreamExt, TryFutureExt, TryStreamExt};
    pub use http::{Method, Uri};
}

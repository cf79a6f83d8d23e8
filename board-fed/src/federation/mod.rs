//! The federation engine: inbox dispatch, outbox generation, and fan-out.

pub mod fanout;
pub mod inbox;
pub mod outbox;

use crate::error::{Error, Result};
use crate::state::AppState;
use sqlx::SqlitePool;

/// Borrow the storage pool, or fail — every federation entry point needs one.
pub async fn pool_or_err(state: &AppState) -> Result<SqlitePool> {
    state.pool().await.ok_or_else(|| Error::Internal("storage pool not connected".into()))
}

/// The host component of an actor/apid URL, used to enforce the "same host" checks
/// required before honoring a Create or Delete.
pub fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
}

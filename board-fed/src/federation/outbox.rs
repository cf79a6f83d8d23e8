//! `GET /{board}/outbox`: an `OrderedCollection` of this board's local threads, each
//! embedding one level of replies.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::ap::Object;
use crate::config::Config;
use crate::error::Result;
use crate::models::Board;
use crate::storage::posts;
use crate::transform;

/// Build the outbox collection. `if_modified_since` lets a peer skip the body entirely
/// (the caller is expected to answer 304 itself when this returns `None`).
pub async fn build(
    pool: &SqlitePool,
    cfg: &Config,
    board: &Board,
    if_modified_since: Option<DateTime<Utc>>,
) -> Result<Option<Object>> {
    if let Some(since) = if_modified_since {
        match posts::latest_local_post_date(pool, &board.id).await? {
            Some(latest) if latest <= since => return Ok(None),
            None => return Ok(None),
            _ => {}
        }
    }

    let ops = posts::list_thread_ops(pool, &board.id).await?;
    let mut items = Vec::with_capacity(ops.len());
    for op in ops.iter().filter(|p| !p.is_federated()) {
        items.push(transform::post_to_object(pool, cfg, op, Vec::new(), true, true).await?);
    }

    let id = format!("{}/outbox", cfg.board_actor_url(&board.id));
    Ok(Some(Object {
        context: Some(crate::ap::ap_context()),
        id: Some(id),
        kind: crate::ap::KIND_ORDERED_COLLECTION.to_string(),
        total_items: Some(items.len() as u64),
        items: Some(items),
        ..Default::default()
    }))
}

//! The per-board reply-edge table.

use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::error::Result;
use crate::models::ReplyEdge;

/// Insert `(source, target)` if absent. Idempotent on the table's unique constraint.
pub async fn insert_edge(tx: &mut Transaction<'_, Sqlite>, board: &str, source: i64, target: i64) -> Result<()> {
    sqlx::query(&format!(
        "INSERT OR IGNORE INTO replies_{board} (source, target) VALUES (?, ?)"
    ))
    .bind(source)
    .bind(target)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Outgoing cites: posts that `post_id` cites.
pub async fn edges_from(pool: &SqlitePool, board: &str, post_id: i64) -> Result<Vec<ReplyEdge>> {
    let rows = sqlx::query(&format!("SELECT source, target FROM replies_{board} WHERE source = ?"))
        .bind(post_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| ReplyEdge {
            source: r.get("source"),
            target: r.get("target"),
        })
        .collect())
}

/// Incoming replies: posts that cite `post_id`.
pub async fn edges_to(pool: &SqlitePool, board: &str, post_id: i64) -> Result<Vec<ReplyEdge>> {
    let rows = sqlx::query(&format!("SELECT source, target FROM replies_{board} WHERE target = ?"))
        .bind(post_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| ReplyEdge {
            source: r.get("source"),
            target: r.get("target"),
        })
        .collect())
}

//! Bans, reports, and the audit log.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::error::Result;
use crate::models::{AuditEntry, AuditType, Ban, Report};
use crate::storage::posts::write_audit;

/// Is `source` currently banned? Private-mode servers never persist client IPs and
/// always answer `false` without touching the table.
pub async fn is_banned(pool: &SqlitePool, cfg: &Config, source: &str) -> Result<bool> {
    if cfg.service.private {
        return Ok(false);
    }

    let now = Utc::now();
    sqlx::query("DELETE FROM bans WHERE source = ? AND expires <= ?")
        .bind(source)
        .bind(now)
        .execute(pool)
        .await?;

    let row = sqlx::query("SELECT 1 FROM bans WHERE source = ?")
        .bind(source)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Place a ban and write the matching audit entry, transactionally. No-op in private mode.
pub async fn place_ban(pool: &SqlitePool, cfg: &Config, ban: &Ban, author: &str, board: &str, post: i64) -> Result<()> {
    if cfg.service.private {
        return Ok(());
    }
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO bans (source, reason, placed, expires) VALUES (?, ?, ?, ?) \
         ON CONFLICT(source) DO UPDATE SET reason = excluded.reason, placed = excluded.placed, expires = excluded.expires",
    )
    .bind(&ban.source)
    .bind(&ban.reason)
    .bind(ban.placed)
    .bind(ban.expires)
    .execute(&mut *tx)
    .await?;
    write_audit(
        &mut tx,
        &AuditEntry {
            id: 0,
            kind: AuditType::Ban,
            date: Utc::now(),
            author: author.to_string(),
            board: board.to_string(),
            post,
            reason: ban.reason.clone(),
        },
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn file_report(pool: &SqlitePool, source: &str, board: &str, post: i64, reason: &str) -> Result<i64> {
    let res = sqlx::query("INSERT INTO reports (source, board, post, reason, date, resolved) VALUES (?, ?, ?, ?, ?, 0)")
        .bind(source)
        .bind(board)
        .bind(post)
        .bind(reason)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn list_open_reports(pool: &SqlitePool) -> Result<Vec<Report>> {
    let rows = sqlx::query("SELECT * FROM reports WHERE resolved = 0 ORDER BY date ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| Report {
            id: r.get("id"),
            source: r.get("source"),
            board: r.get("board"),
            post: r.get("post"),
            reason: r.get("reason"),
            date: r.get("date"),
            resolved: r.get::<i64, _>("resolved") != 0,
        })
        .collect())
}

pub async fn resolve_report(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE reports SET resolved = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

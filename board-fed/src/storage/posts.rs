//! Transactional post insert, delete, and lookup — the heart of the storage engine.

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ingest::{crossref, sjis};
use crate::models::{post_flags, AuditEntry, AuditType, Post};
use crate::storage::replies;

const MAX_APID_RETRIES: u32 = 5;

fn row_to_post(board: &str, row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        board: board.to_string(),
        id: row.get("id"),
        thread: row.get("thread"),
        apid: row.get("apid"),
        name: row.get("name"),
        tripcode: row.get("tripcode"),
        subject: row.get("subject"),
        source: row.get("source"),
        raw: row.get("raw"),
        content: row.get("content"),
        date: row.get("date"),
        bumpdate: row.get("bumpdate"),
        flags: row.get("flags"),
    }
}

pub async fn find_by_id(pool: &SqlitePool, board: &str, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT * FROM posts_{board} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| row_to_post(board, &r)))
}

pub async fn find_by_apid(pool: &SqlitePool, board: &str, apid: &str) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT * FROM posts_{board} WHERE apid = ?"))
        .bind(apid)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| row_to_post(board, &r)))
}

/// Thread OPs, catalog order (by id ascending, per the Open Questions resolution).
pub async fn list_thread_ops(pool: &SqlitePool, board: &str) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!("SELECT * FROM posts_{board} WHERE thread = 0 ORDER BY id ASC"))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| row_to_post(board, r)).collect())
}

/// Thread OPs, index order (by bumpdate descending).
pub async fn list_thread_ops_by_bump(pool: &SqlitePool, board: &str) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "SELECT * FROM posts_{board} WHERE thread = 0 ORDER BY bumpdate DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| row_to_post(board, r)).collect())
}

/// Every reply belonging to thread `op_id`, oldest first.
pub async fn list_thread_replies(pool: &SqlitePool, board: &str, op_id: i64) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "SELECT * FROM posts_{board} WHERE thread = ? ORDER BY id ASC"
    ))
    .bind(op_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| row_to_post(board, r)).collect())
}

/// The creation date of the most recently saved *local-origin* post, used to honor
/// `If-Modified-Since` on the outbox.
pub async fn latest_local_post_date(pool: &SqlitePool, board: &str) -> Result<Option<DateTime<Utc>>> {
    let row = sqlx::query(&format!(
        "SELECT MAX(date) as d FROM posts_{board} WHERE source NOT LIKE 'http://%' AND source NOT LIKE 'https://%'"
    ))
    .fetch_one(pool)
    .await?;
    Ok(row.try_get::<Option<DateTime<Utc>>, _>("d")?)
}

fn mint_apid(cfg: &Config, board: &str) -> String {
    let mut rng = rand::thread_rng();
    let letter = (b'A' + rng.gen_range(0..6)) as char; // A..=F
    let digits: u32 = rng.gen_range(0..0x1000_0000);
    format!(
        "{}://{}/{}/{}{:07x}",
        cfg.service.transport, cfg.service.fqdn, board, letter, digits
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("2067") || db.message().contains("UNIQUE"))
}

/// `SavePost`: validates, mints an apid if needed, rewrites cross-references, inserts,
/// records reply edges, and bumps the thread — all inside one transaction.
pub async fn save_post(pool: &SqlitePool, cfg: &Config, filters: &[Regex], post: &mut Post) -> Result<Post> {
    if post.date == DateTime::<Utc>::default() {
        post.date = Utc::now();
    }
    if post.raw.trim().is_empty() {
        return Err(Error::InvalidContent("empty post".into()));
    }
    if filters.iter().any(|re| re.is_match(&post.raw)) {
        return Err(Error::InvalidContent("rejected by content filter".into()));
    }
    if post.apid.is_empty() {
        post.apid = mint_apid(cfg, &post.board);
    }

    let is_local_origin = !post.source.starts_with("http://") && !post.source.starts_with("https://");

    // Private-mode servers never persist client IPs; the source is replaced with a
    // loopback sentinel before the row is ever written.
    if cfg.service.private && is_local_origin {
        post.source = "127.0.0.1".to_string();
    }
    let mut reply_targets = Vec::new();

    if post.content.is_empty() {
        let result = crossref::process(pool, &post.board, post.thread, &post.raw, is_local_origin).await?;
        post.content = result.content;
        post.raw = result.raw;
        reply_targets = result.reply_targets;
    }

    if sjis::contains_japanese(&post.raw) {
        post.flags |= post_flags::SJIS;
    }

    let mut tx = pool.begin().await?;
    let mut attempt = 0;
    loop {
        let insert_result = sqlx::query(&format!(
            "INSERT INTO posts_{board} (thread, apid, name, tripcode, subject, source, raw, content, date, bumpdate, flags) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            board = post.board
        ))
        .bind(post.thread)
        .bind(&post.apid)
        .bind(&post.name)
        .bind(&post.tripcode)
        .bind(&post.subject)
        .bind(&post.source)
        .bind(&post.raw)
        .bind(&post.content)
        .bind(post.date)
        .bind(post.bumpdate)
        .bind(post.flags)
        .execute(&mut *tx)
        .await;

        match insert_result {
            Ok(res) => {
                post.id = res.last_insert_rowid();
                break;
            }
            Err(e) if is_unique_violation(&e) && attempt < MAX_APID_RETRIES => {
                attempt += 1;
                post.apid = mint_apid(cfg, &post.board);
                continue;
            }
            Err(e) => return Err(Error::Conflict(format!("apid mint exhausted retries: {e}"))),
        }
    }

    for target in &reply_targets {
        replies::insert_edge(&mut tx, &post.board, post.id, *target).await?;
    }

    let is_sage = post.is_sage();
    if !is_sage && post.thread != 0 {
        sqlx::query(&format!("UPDATE posts_{board} SET bumpdate = ? WHERE id = ?", board = post.board))
            .bind(Utc::now())
            .bind(post.thread)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(post.clone())
}

/// Delete a single post and write an audit entry, in one transaction.
pub async fn delete_post(pool: &SqlitePool, board: &str, id: i64, author: &str, reason: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(&format!("DELETE FROM posts_{board} WHERE id = ?"))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    write_audit(
        &mut tx,
        &AuditEntry {
            id: 0,
            kind: AuditType::Delete,
            date: Utc::now(),
            author: author.to_string(),
            board: board.to_string(),
            post: id,
            reason: reason.to_string(),
        },
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Cascade-delete a whole thread (`id = T OR thread = T`) and write one audit entry.
/// Reply-edge rows referencing the deleted posts are left orphaned; lookup joins
/// already check post existence, so this is cheap and harmless.
pub async fn delete_thread(pool: &SqlitePool, board: &str, thread_id: i64, author: &str, reason: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(&format!("DELETE FROM posts_{board} WHERE id = ? OR thread = ?"))
        .bind(thread_id)
        .bind(thread_id)
        .execute(&mut *tx)
        .await?;
    write_audit(
        &mut tx,
        &AuditEntry {
            id: 0,
            kind: AuditType::Delete,
            date: Utc::now(),
            author: author.to_string(),
            board: board.to_string(),
            post: thread_id,
            reason: reason.to_string(),
        },
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn write_audit(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, entry: &AuditEntry) -> Result<()> {
    sqlx::query("INSERT INTO auditlog (type, date, author, board, post, reason) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(entry.kind.as_i64())
        .bind(entry.date)
        .bind(&entry.author)
        .bind(&entry.board)
        .bind(entry.post)
        .bind(&entry.reason)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Test-only fixture helper: insert a post bypassing `save_post`'s validation and
/// cross-reference processing, for seeding reply targets in isolation.
#[cfg(test)]
pub async fn insert_raw(pool: &SqlitePool, post: &Post) -> Result<i64> {
    let res = sqlx::query(&format!(
        "INSERT INTO posts_{board} (thread, apid, name, tripcode, subject, source, raw, content, date, bumpdate, flags) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        board = post.board
    ))
    .bind(post.thread)
    .bind(&post.apid)
    .bind(&post.name)
    .bind(&post.tripcode)
    .bind(&post.subject)
    .bind(&post.source)
    .bind(&post.raw)
    .bind(&post.content)
    .bind(post.date)
    .bind(post.bumpdate)
    .bind(post.flags)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

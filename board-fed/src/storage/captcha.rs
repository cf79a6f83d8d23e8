//! CAPTCHA challenge storage. Image generation is an external collaborator
//! ([`crate::captcha_pool`]); this module only persists and consumes entries.

use rand::Rng;
use sqlx::{Row, SqlitePool};

use crate::error::Result;
use crate::models::CaptchaEntry;

pub async fn insert_batch(pool: &SqlitePool, entries: &[CaptchaEntry]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query("INSERT OR REPLACE INTO captchas (id, solution, image) VALUES (?, ?, ?)")
            .bind(&entry.id)
            .bind(&entry.solution)
            .bind(&entry.image)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) FROM captchas").fetch_one(pool).await?;
    Ok(row.get(0))
}

/// Fetch one entry at random, without consuming it.
pub async fn fetch_random(pool: &SqlitePool) -> Result<Option<CaptchaEntry>> {
    let total = count(pool).await?;
    if total == 0 {
        return Ok(None);
    }
    let offset = rand::thread_rng().gen_range(0..total);
    let row = sqlx::query("SELECT id, solution, image FROM captchas LIMIT 1 OFFSET ?")
        .bind(offset)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| CaptchaEntry {
        id: r.get("id"),
        solution: r.get("solution"),
        image: r.get("image"),
    }))
}

/// Consume the entry `id` if `attempt` matches its solution (case-insensitive).
/// Deleting up front makes this idempotent: a second call with the right answer
/// after the first already fails, matching a one-shot challenge.
pub async fn solve(pool: &SqlitePool, id: &str, attempt: &str) -> Result<bool> {
    let row = sqlx::query("SELECT solution FROM captchas WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else { return Ok(false) };
    let solution: String = row.get("solution");
    sqlx::query("DELETE FROM captchas WHERE id = ?").bind(id).execute(pool).await?;
    Ok(solution.eq_ignore_ascii_case(attempt))
}

//! Compiled content filters consulted by [`crate::storage::posts::save_post`].

use regex::Regex;
use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::models::RegexFilter;

pub async fn list_filters(pool: &SqlitePool) -> Result<Vec<RegexFilter>> {
    let rows = sqlx::query("SELECT id, pattern FROM regexps ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| RegexFilter {
            id: r.get("id"),
            pattern: r.get("pattern"),
        })
        .collect())
}

/// Compile every stored pattern. A filter that no longer compiles (should not happen,
/// since `add_filter` validates up front) is skipped rather than poisoning the set.
pub async fn compiled_filters(pool: &SqlitePool) -> Result<Vec<Regex>> {
    Ok(list_filters(pool)
        .await?
        .into_iter()
        .filter_map(|f| Regex::new(&f.pattern).ok())
        .collect())
}

pub async fn add_filter(pool: &SqlitePool, pattern: &str) -> Result<i64> {
    Regex::new(pattern).map_err(|e| Error::BadRequest(format!("invalid filter pattern: {e}")))?;
    let res = sqlx::query("INSERT INTO regexps (pattern) VALUES (?)")
        .bind(pattern)
        .execute(pool)
        .await?;
    Ok(res.last_insert_rowid())
}

pub async fn remove_filter(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM regexps WHERE id = ?").bind(id).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        schema::upgrade(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn add_then_compiled_filters_matches() {
        let pool = seeded_pool().await;
        add_filter(&pool, "spam").await.unwrap();
        let filters = compiled_filters(&pool).await.unwrap();
        assert_eq!(filters.len(), 1);
        assert!(filters[0].is_match("buy spam now"));
    }

    #[tokio::test]
    async fn add_rejects_invalid_pattern() {
        let pool = seeded_pool().await;
        let err = add_filter(&pool, "(unclosed").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn remove_filter_drops_it() {
        let pool = seeded_pool().await;
        let id = add_filter(&pool, "spam").await.unwrap();
        remove_filter(&pool, id).await.unwrap();
        assert!(list_filters(&pool).await.unwrap().is_empty());
    }
}

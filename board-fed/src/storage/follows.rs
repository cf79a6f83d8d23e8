//! Per-board follower/following actor lists.

use sqlx::{Row, SqlitePool};

use crate::error::Result;

pub async fn add_follower(pool: &SqlitePool, board: &str, actor_url: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO followers (board, actor_url) VALUES (?, ?)")
        .bind(board)
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_follower(pool: &SqlitePool, board: &str, actor_url: &str) -> Result<()> {
    sqlx::query("DELETE FROM followers WHERE board = ? AND actor_url = ?")
        .bind(board)
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_followers(pool: &SqlitePool, board: &str) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT actor_url FROM followers WHERE board = ? ORDER BY actor_url")
        .bind(board)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("actor_url")).collect())
}

pub async fn add_following(pool: &SqlitePool, board: &str, actor_url: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO following (board, actor_url) VALUES (?, ?)")
        .bind(board)
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_following(pool: &SqlitePool, board: &str, actor_url: &str) -> Result<()> {
    sqlx::query("DELETE FROM following WHERE board = ? AND actor_url = ?")
        .bind(board)
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_following(pool: &SqlitePool, board: &str) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT actor_url FROM following WHERE board = ? ORDER BY actor_url")
        .bind(board)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("actor_url")).collect())
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
    async fn follower_add_remove_roundtrips() {
        let pool = seeded_pool().await;
        add_follower(&pool, "g", "https://peer.example/u/alice").await.unwrap();
        add_follower(&pool, "g", "https://peer.example/u/alice").await.unwrap();
        assert_eq!(list_followers(&pool, "g").await.unwrap().len(), 1);

        remove_follower(&pool, "g", "https://peer.example/u/alice").await.unwrap();
        assert!(list_followers(&pool, "g").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn following_is_independent_of_followers() {
        let pool = seeded_pool().await;
        add_following(&pool, "g", "https://peer.example/u/bob").await.unwrap();
        assert_eq!(list_following(&pool, "g").await.unwrap().len(), 1);
        assert!(list_followers(&pool, "g").await.unwrap().is_empty());
    }
}

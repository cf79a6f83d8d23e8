//! Board creation and lookup, including the per-board dynamic table pair.

use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::models::Board;

/// Board ids become SQL identifiers (`posts_{id}`, `replies_{id}`); reject anything
/// that is not lowercase alphanumeric before it ever touches a string-concatenation
/// path that also carries user input.
pub fn validate_board_id(id: &str) -> Result<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) || id.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(Error::BadRequest(format!("invalid board id: {id}")));
    }
    Ok(())
}

/// Create a board: the global `boards` row plus its `posts_{id}`/`replies_{id}` tables.
pub async fn create_board(pool: &SqlitePool, board: &Board) -> Result<()> {
    validate_board_id(&board.id)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO boards (id, title, description, public_key_pem, private_key_pem) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&board.id)
    .bind(&board.title)
    .bind(&board.description)
    .bind(&board.public_key_pem)
    .bind(&board.private_key_pem)
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE posts_{id} (
            id INTEGER PRIMARY KEY,
            thread INTEGER NOT NULL DEFAULT 0,
            apid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT 'Anonymous',
            tripcode TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL,
            raw TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            date TIMESTAMP NOT NULL,
            bumpdate TIMESTAMP NOT NULL,
            flags INTEGER NOT NULL DEFAULT 0
        )
        "#,
        id = board.id
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE replies_{id} (
            source INTEGER NOT NULL,
            target INTEGER NOT NULL,
            UNIQUE (source, target)
        )
        "#,
        id = board.id
    ))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_board(pool: &SqlitePool, id: &str) -> Result<Option<Board>> {
    validate_board_id(id)?;
    let row = sqlx::query("SELECT id, title, description, public_key_pem, private_key_pem FROM boards WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| Board {
        id: r.get("id"),
        title: r.get("title"),
        description: r.get("description"),
        public_key_pem: r.get("public_key_pem"),
        private_key_pem: r.get("private_key_pem"),
    }))
}

pub async fn list_boards(pool: &SqlitePool) -> Result<Vec<Board>> {
    let rows = sqlx::query("SELECT id, title, description, public_key_pem, private_key_pem FROM boards ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|r| Board {
            id: r.get("id"),
            title: r.get("title"),
            description: r.get("description"),
            public_key_pem: r.get("public_key_pem"),
            private_key_pem: r.get("private_key_pem"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::storage::schema::upgrade(&pool).await.unwrap();
        pool
    }

    #[test]
    fn rejects_uppercase_and_symbols() {
        assert!(validate_board_id("Tech").is_err());
        assert!(validate_board_id("g/a").is_err());
        assert!(validate_board_id("").is_err());
        assert!(validate_board_id("prog").is_ok());
    }

    #[tokio::test]
    async fn create_and_fetch_roundtrips() {
        let pool = test_pool().await;
        let board = Board {
            id: "g".into(),
            title: "Technology".into(),
            description: String::new(),
            public_key_pem: "pub".into(),
            private_key_pem: "priv".into(),
        };
        create_board(&pool, &board).await.unwrap();

        let fetched = get_board(&pool, "g").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Technology");

        let count: i64 = sqlx::query("SELECT COUNT(*) FROM posts_g")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get(0);
        assert_eq!(count, 0);
    }
}

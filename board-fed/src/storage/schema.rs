//! Schema versioning via `PRAGMA user_version`, mirroring the upgrade loop in
//! `examples/original_source/database/sqlite3_upgrade.go`.

use sqlx::{Row, SqlitePool};

use crate::error::Result;

type Upgrade = for<'a> fn(
    &'a mut sqlx::Transaction<'_, sqlx::Sqlite>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

fn upgrades() -> Vec<Upgrade> {
    vec![|tx| Box::pin(upgrade_0(tx))]
}

/// Open (already-connected) and bring the schema up to the latest version.
///
/// A pre-versioned legacy database (`user_version` still 0 but `boards` already
/// exists) runs the same steps as a fresh one: every upgrade uses
/// `CREATE TABLE IF NOT EXISTS`, so re-applying step 0 against it is a no-op.
pub async fn upgrade(pool: &SqlitePool) -> Result<()> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    let version: i64 = row.try_get(0)?;

    let steps = upgrades();

    for (idx, step) in steps.iter().enumerate().skip(version as usize) {
        let mut tx = pool.begin().await?;
        step(&mut tx).await?;
        sqlx::query(&format!("PRAGMA user_version = {}", idx + 1))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Version 0 → 1: create every global table. Per-board tables are created lazily by
/// [`crate::storage::boards::create_board`], not by the versioned upgrade path.
async fn upgrade_0(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS boards (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            public_key_pem TEXT NOT NULL,
            private_key_pem TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS moderators (
            username TEXT PRIMARY KEY,
            hash BLOB NOT NULL,
            salt BLOB NOT NULL,
            type INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auditlog (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type INTEGER NOT NULL,
            date TIMESTAMP NOT NULL,
            author TEXT NOT NULL,
            board TEXT NOT NULL,
            post INTEGER NOT NULL,
            reason TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            board TEXT NOT NULL,
            post INTEGER NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            date TIMESTAMP NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            date TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS captchas (
            id TEXT PRIMARY KEY,
            solution TEXT NOT NULL,
            image BLOB NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bans (
            source TEXT PRIMARY KEY,
            reason TEXT NOT NULL DEFAULT '',
            placed TIMESTAMP NOT NULL,
            expires TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS followers (
            board TEXT NOT NULL,
            actor_url TEXT NOT NULL,
            PRIMARY KEY (board, actor_url)
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS following (
            board TEXT NOT NULL,
            actor_url TEXT NOT NULL,
            PRIMARY KEY (board, actor_url)
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS regexps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    Ok(())
}

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open (creating if needed) the index database at `path` and make sure
/// its tables exist.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_index INTEGER PRIMARY KEY,
            id TEXT NOT NULL,
            start INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            source TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes saved before chunks carried their source lack the column
    let source_columns: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('chunk_vectors') WHERE name = 'source'",
    )
    .fetch_one(pool)
    .await?;
    if source_columns == 0 {
        sqlx::query("ALTER TABLE chunk_vectors ADD COLUMN source TEXT")
            .execute(pool)
            .await?;
    }

    Ok(())
}

//! Row types for the memory database, pool setup and migration runner.

use std::path::Path;

use {
    serde::Serialize,
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    },
};

use crate::error::Result;

/// A stored conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub id: i64,
    /// Conversation the summary was taken from.
    pub chat_key: String,
    /// Local date the summary was taken, `YYYY-MM-DD`.
    pub session_date: String,
    /// Inbound message count at the time of summarization.
    pub message_count: i64,
    pub summary: String,
    pub key_points: Vec<String>,
    pub created_at: String,
}

/// Open (creating if needed) the memory database at `path`.
pub async fn open_pool(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    tracing::debug!(path = %path.display(), "memory database ready");
    Ok(pool)
}

/// Create the `messages`, `conversation_summaries` and `user_profile` tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Single-connection in-memory pool for tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_create_tables() {
        let pool = memory_pool().await;
        for table in ["messages", "conversation_summaries", "user_profile"] {
            let row: (i64,) = sqlx::query_as(&format!("SELECT count(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(row.0, 0, "{table}");
        }
    }

    #[tokio::test]
    async fn legacy_summaries_get_empty_chat_key() {
        let pool = memory_pool().await;
        sqlx::query(
            "INSERT INTO conversation_summaries (session_date, message_count, summary)
             VALUES ('2025-01-01', 5, 'old')",
        )
        .execute(&pool)
        .await
        .unwrap();
        let row: (String,) = sqlx::query_as("SELECT chat_key FROM conversation_summaries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, "");
    }

    #[tokio::test]
    async fn open_pool_creates_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.db");
        let pool = open_pool(&path).await.unwrap();
        assert!(path.exists());
        pool.close().await;

        // Reopening runs migrations again without error.
        let pool = open_pool(&path).await.unwrap();
        pool.close().await;
    }
}

//! Inbound messages read from the Messages database (`chat.db`).
//!
//! The database is opened read-only; Messages.app keeps writing to it while
//! we poll. Requires Full Disk Access for the process on macOS.

use std::path::Path;

use {
    async_trait::async_trait,
    ringle_channels::{MessageSource, PolledMessage},
    sqlx::{
        SqlitePool,
        sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    },
    tracing::debug,
};

use crate::error::{IMessageError, Result};

/// Rows fetched per poll.
const POLL_LIMIT: i64 = 100;

const LATEST_CURSOR_SQL: &str = "\
    SELECT COALESCE(MAX(message.ROWID), 0) \
    FROM message \
    JOIN handle ON message.handle_id = handle.ROWID \
    WHERE handle.id = ?1 AND message.is_from_me = 0";

const POLL_SQL: &str = "\
    SELECT message.ROWID, message.text, handle.service \
    FROM message \
    JOIN handle ON message.handle_id = handle.ROWID \
    WHERE handle.id = ?1 AND message.ROWID > ?2 AND message.is_from_me = 0 \
    ORDER BY message.ROWID ASC \
    LIMIT ?3";

/// Messages received from one handle (phone number or Apple ID).
pub struct ChatDbSource {
    pool: SqlitePool,
    handle: String,
}

impl ChatDbSource {
    pub async fn open(path: &Path, handle: impl Into<String>) -> Result<Self> {
        if !path.exists() {
            return Err(IMessageError::DatabaseMissing {
                path: path.to_path_buf(),
            });
        }
        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self::from_pool(pool, handle))
    }

    pub fn from_pool(pool: SqlitePool, handle: impl Into<String>) -> Self {
        Self {
            pool,
            handle: handle.into(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    async fn fetch_latest(&self) -> Result<i64> {
        let (rowid,): (i64,) = sqlx::query_as(LATEST_CURSOR_SQL)
            .bind(&self.handle)
            .fetch_one(&self.pool)
            .await?;
        Ok(rowid)
    }

    async fn fetch_since(&self, since: i64) -> Result<Vec<PolledMessage>> {
        let rows: Vec<(i64, Option<String>, Option<String>)> = sqlx::query_as(POLL_SQL)
            .bind(&self.handle)
            .bind(since)
            .bind(POLL_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        debug!(handle = %self.handle, since, rows = rows.len(), "polled chat.db");
        Ok(rows
            .into_iter()
            .map(|(cursor, text, service)| PolledMessage {
                cursor,
                // Attachment-only and attributed-body rows carry no plain text.
                text: text.unwrap_or_default(),
                service_hint: service.filter(|s| !s.is_empty()),
            })
            .collect())
    }
}

#[async_trait]
impl MessageSource for ChatDbSource {
    async fn latest_cursor(&self) -> ringle_channels::Result<i64> {
        Ok(self.fetch_latest().await?)
    }

    async fn poll(&self, since: i64) -> ringle_channels::Result<Vec<PolledMessage>> {
        Ok(self.fetch_since(since).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PEER: &str = "+15550001111";

    /// The subset of the chat.db schema the queries touch.
    async fn fixture() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE handle (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT NOT NULL, \
             service TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE message (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, text TEXT, \
             handle_id INTEGER DEFAULT 0, is_from_me INTEGER DEFAULT 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO handle (ROWID, id, service) VALUES (1, ?1, 'iMessage'), (2, ?1, 'SMS'), \
             (3, '+15559999999', 'iMessage')",
        )
        .bind(PEER)
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    async fn insert(pool: &SqlitePool, text: Option<&str>, handle_id: i64, from_me: bool) -> i64 {
        sqlx::query("INSERT INTO message (text, handle_id, is_from_me) VALUES (?1, ?2, ?3)")
            .bind(text)
            .bind(handle_id)
            .bind(from_me)
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn latest_cursor_ignores_own_and_other_messages() {
        let pool = fixture().await;
        let source = ChatDbSource::from_pool(pool.clone(), PEER);
        assert_eq!(source.latest_cursor().await.unwrap(), 0);

        let theirs = insert(&pool, Some("hi"), 1, false).await;
        insert(&pool, Some("hello back"), 1, true).await;
        insert(&pool, Some("spam"), 3, false).await;
        assert_eq!(source.latest_cursor().await.unwrap(), theirs);
    }

    #[tokio::test]
    async fn poll_returns_new_rows_in_order_with_service() {
        let pool = fixture().await;
        let source = ChatDbSource::from_pool(pool.clone(), PEER);
        let old = insert(&pool, Some("before startup"), 1, false).await;
        let cursor = source.latest_cursor().await.unwrap();
        assert_eq!(cursor, old);

        let a = insert(&pool, Some("over iMessage"), 1, false).await;
        insert(&pool, Some("my reply"), 1, true).await;
        let b = insert(&pool, Some("over SMS"), 2, false).await;
        let c = insert(&pool, None, 1, false).await;
        insert(&pool, Some("someone else"), 3, false).await;

        let rows = source.poll(cursor).await.unwrap();
        assert_eq!(rows, vec![
            PolledMessage {
                cursor: a,
                text: "over iMessage".into(),
                service_hint: Some("iMessage".into()),
            },
            PolledMessage {
                cursor: b,
                text: "over SMS".into(),
                service_hint: Some("SMS".into()),
            },
            PolledMessage {
                cursor: c,
                text: String::new(),
                service_hint: Some("iMessage".into()),
            },
        ]);
        assert!(source.poll(c).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_database_is_reported() {
        let err = ChatDbSource::open(Path::new("/nonexistent/chat.db"), PEER)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IMessageError::DatabaseMissing { .. }));
    }
}

/// SQLite implementation of the `MemoryStore` trait.
use std::collections::BTreeMap;

use {
    async_trait::async_trait,
    ringle_common::{ChatRole, HistoryEntry, now_ms},
    sqlx::SqlitePool,
    tracing::{debug, warn},
};

use crate::{error::Result, schema::SummaryRow, store::MemoryStore};

pub struct SqliteMemoryStore {
    pool: SqlitePool,
}

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

type SummaryTuple = (i64, String, String, i64, String, Option<String>, String);

fn summary_from_row(
    (id, chat_key, session_date, message_count, summary, key_points, created_at): SummaryTuple,
) -> SummaryRow {
    let key_points = key_points
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_default();
    SummaryRow {
        id,
        chat_key,
        session_date,
        message_count,
        summary,
        key_points,
        created_at,
    }
}

/// Stored profile text is JSON; anything else is returned as a string.
fn profile_value(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn append_message(&self, chat_key: &str, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (chat_key, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(chat_key)
        .bind(entry.role.as_str())
        .bind(&entry.content)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_messages(&self, chat_key: &str, limit: u32) -> Result<Vec<HistoryEntry>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT role, content FROM (
                SELECT id, role, content FROM messages WHERE chat_key = ?
                ORDER BY id DESC LIMIT ?
             ) ORDER BY id ASC",
        )
        .bind(chat_key)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(role, content)| match ChatRole::parse(&role) {
                Some(role) => Some(HistoryEntry { role, content }),
                None => {
                    warn!(role = %role, "skipping transcript row with unknown role");
                    None
                },
            })
            .collect())
    }

    async fn save_summary(
        &self,
        chat_key: &str,
        summary: &str,
        key_points: &[String],
        message_count: u64,
    ) -> Result<i64> {
        let session_date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let key_points_json = serde_json::to_string(key_points)?;
        let id = sqlx::query(
            "INSERT INTO conversation_summaries
                (chat_key, session_date, message_count, summary, key_points)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat_key)
        .bind(&session_date)
        .bind(i64::try_from(message_count).unwrap_or(i64::MAX))
        .bind(summary)
        .bind(key_points_json)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        debug!(id, chat_key, message_count, "saved conversation summary");
        Ok(id)
    }

    async fn recent_summaries(
        &self,
        chat_key: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SummaryRow>> {
        let rows: Vec<SummaryTuple> = sqlx::query_as(
            "SELECT id, chat_key, session_date, message_count, summary, key_points,
                    CAST(created_at AS TEXT)
             FROM conversation_summaries
             WHERE ?1 IS NULL OR chat_key = ?1
             ORDER BY id DESC LIMIT ?2",
        )
        .bind(chat_key)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(summary_from_row).collect())
    }

    async fn set_profile(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_profile (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;
        debug!(key, "updated user profile");
        Ok(())
    }

    async fn get_profile(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM user_profile WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(raw,)| profile_value(raw)))
    }

    async fn profile(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM user_profile")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, raw)| (key, profile_value(raw)))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::schema::memory_pool, serde_json::json};

    async fn setup() -> SqliteMemoryStore {
        SqliteMemoryStore::new(memory_pool().await)
    }

    #[tokio::test]
    async fn transcript_is_chronological_and_scoped() {
        let store = setup().await;
        for i in 0..6 {
            store
                .append_message("imessage:+1555", &HistoryEntry::user(format!("u{i}")))
                .await
                .unwrap();
            store
                .append_message("imessage:+1555", &HistoryEntry::assistant(format!("a{i}")))
                .await
                .unwrap();
        }
        store
            .append_message("telegram:42", &HistoryEntry::user("other chat"))
            .await
            .unwrap();

        let recent = store.recent_messages("imessage:+1555", 4).await.unwrap();
        assert_eq!(recent, vec![
            HistoryEntry::user("u4"),
            HistoryEntry::assistant("a4"),
            HistoryEntry::user("u5"),
            HistoryEntry::assistant("a5"),
        ]);

        let other = store.recent_messages("telegram:42", 10).await.unwrap();
        assert_eq!(other, vec![HistoryEntry::user("other chat")]);
        assert!(store.recent_messages("nobody", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summaries_newest_first() {
        let store = setup().await;
        assert!(store.latest_summary("imessage:+1555").await.unwrap().is_none());

        store
            .save_summary(
                "imessage:+1555",
                "talked about weekend plans",
                &["past tense".into()],
                5,
            )
            .await
            .unwrap();
        let id = store
            .save_summary(
                "imessage:+1555",
                "homework review",
                &["articles".into(), "plurals".into()],
                10,
            )
            .await
            .unwrap();

        let latest = store.latest_summary("imessage:+1555").await.unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.chat_key, "imessage:+1555");
        assert_eq!(latest.summary, "homework review");
        assert_eq!(latest.key_points, vec!["articles", "plurals"]);
        assert_eq!(latest.message_count, 10);
        assert_eq!(latest.session_date.len(), 10);

        let all = store.recent_summaries(None, 5).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].summary, "talked about weekend plans");
    }

    #[tokio::test]
    async fn summaries_are_scoped_to_their_chat() {
        let store = setup().await;
        store
            .save_summary("telegram:42", "ordered coffee politely", &[], 5)
            .await
            .unwrap();
        store
            .save_summary("imessage:+1555", "job interview practice", &[], 5)
            .await
            .unwrap();

        let tg = store.latest_summary("telegram:42").await.unwrap().unwrap();
        assert_eq!(tg.summary, "ordered coffee politely");
        assert!(store.latest_summary("telegram:7").await.unwrap().is_none());

        let im = store.recent_summaries(Some("imessage:+1555"), 10).await.unwrap();
        assert_eq!(im.len(), 1);
        assert_eq!(im[0].summary, "job interview practice");
        assert_eq!(store.recent_summaries(None, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn profile_upsert_and_plain_text_values() {
        let store = setup().await;
        store
            .set_profile("learning_goal", &json!({"target": "IELTS", "band": 7}))
            .await
            .unwrap();
        store.set_profile("level", &json!("B1")).await.unwrap();
        store.set_profile("level", &json!("B2")).await.unwrap();

        assert_eq!(
            store.get_profile("level").await.unwrap(),
            Some(json!("B2"))
        );
        assert!(store.get_profile("missing").await.unwrap().is_none());

        // Rows written by other tools may hold bare text.
        sqlx::query("INSERT INTO user_profile (key, value) VALUES ('nickname', 'Kwon')")
            .execute(store.pool())
            .await
            .unwrap();

        let profile = store.profile().await.unwrap();
        assert_eq!(profile.len(), 3);
        assert_eq!(profile["learning_goal"]["band"], 7);
        assert_eq!(profile["nickname"], json!("Kwon"));
    }
}

use std::collections::BTreeMap;

use {async_trait::async_trait, ringle_common::HistoryEntry};

use crate::{error::Result, schema::SummaryRow};

/// Persistent conversation memory: transcript, summaries and user profile.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn append_message(&self, chat_key: &str, entry: &HistoryEntry) -> Result<()>;

    /// The last `limit` turns of a conversation, oldest first.
    async fn recent_messages(&self, chat_key: &str, limit: u32) -> Result<Vec<HistoryEntry>>;

    /// Returns the new summary id.
    async fn save_summary(
        &self,
        chat_key: &str,
        summary: &str,
        key_points: &[String],
        message_count: u64,
    ) -> Result<i64>;

    /// Newest first, across every chat when `chat_key` is `None`.
    async fn recent_summaries(&self, chat_key: Option<&str>, limit: u32) -> Result<Vec<SummaryRow>>;

    async fn latest_summary(&self, chat_key: &str) -> Result<Option<SummaryRow>> {
        Ok(self
            .recent_summaries(Some(chat_key), 1)
            .await?
            .into_iter()
            .next())
    }

    async fn set_profile(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    async fn get_profile(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// All profile entries.
    async fn profile(&self) -> Result<BTreeMap<String, serde_json::Value>>;
}

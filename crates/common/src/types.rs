use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

/// Identifier of one inbound-message-to-delivered-reply cycle.
///
/// Ids are strictly increasing for the lifetime of a delivery queue; `0` is
/// the initial watermark before any session has started.
pub type SessionId = u64;

/// Where a reply is delivered: a channel plus the chat/peer inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyTarget {
    /// Channel id, e.g. `"imessage"` or `"telegram"`.
    pub channel: String,
    /// Chat/peer identifier inside the channel (phone number, chat id, ...).
    pub chat_id: String,
}

impl ReplyTarget {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Stable key used to scope transcripts and per-target state.
    pub fn key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }
}

impl fmt::Display for ReplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.chat_id)
    }
}

/// A message received from a channel, normalized for the reply pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel-specific message id (chat.db ROWID, Telegram message id, ...).
    pub id: String,
    pub target: ReplyTarget,
    pub text: String,
    /// Optional transport-routing hint, e.g. `"SMS"` vs `"iMessage"`.
    pub service_hint: Option<String>,
    pub sender_name: Option<String>,
    pub received_at: i64,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, target: ReplyTarget, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target,
            text: text.into(),
            service_hint: None,
            sender_name: None,
            received_at: now_ms(),
        }
    }

    #[must_use]
    pub fn with_service_hint(mut self, hint: impl Into<String>) -> Self {
        self.service_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }
}

/// Who authored a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One turn of conversation history, oldest-first when returned in a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Language detected for an inbound message, used to localize prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Korean,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Korean => "ko",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Korean => "Korean",
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn reply_target_key_and_display_match() {
        let target = ReplyTarget::new("telegram", "42");
        assert_eq!(target.key(), "telegram:42");
        assert_eq!(target.to_string(), "telegram:42");
    }

    #[test]
    fn chat_role_parse_roundtrip() {
        for role in [ChatRole::User, ChatRole::Assistant] {
            assert_eq!(ChatRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ChatRole::parse("system"), None);
    }

    #[test]
    fn language_serializes_lowercase() {
        let json = serde_json::to_string(&Language::Korean).unwrap();
        assert_eq!(json, "\"korean\"");
        assert_eq!(Language::default().code(), "en");
    }

    #[test]
    fn inbound_builder_sets_optional_fields() {
        let msg = InboundMessage::new("7", ReplyTarget::new("imessage", "+15551234"), "hi")
            .with_service_hint("SMS")
            .with_sender_name("Kwon");
        assert_eq!(msg.service_hint.as_deref(), Some("SMS"));
        assert_eq!(msg.sender_name.as_deref(), Some("Kwon"));
        assert!(msg.received_at > 0);
    }
}

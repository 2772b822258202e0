/// Config schema types (segmenter, pacing, delivery, conversation, persona,
/// provider, memory, channels).
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RingleConfig {
    pub segmenter: SegmenterConfig,
    pub pacing: PacingConfig,
    pub delivery: DeliveryConfig,
    pub conversation: ConversationConfig,
    pub persona: PersonaConfig,
    pub provider: ProviderConfig,
    pub memory: MemoryConfig,
    pub channels: ChannelsConfig,
}

/// How a generated reply is cut into chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Replies with fewer words than this are never split. Defaults to 5.
    pub short_response_words: usize,
    /// Segments longer than this many characters are split into sentences.
    /// Defaults to 200.
    pub max_segment_chars: usize,
    /// Chunks with fewer words are merged into the previous chunk. Defaults to 3.
    pub min_fragment_words: usize,
    /// Discourse markers that open a new chunk. Matched case-insensitively.
    pub transition_phrases: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            short_response_words: 5,
            max_segment_chars: 200,
            min_fragment_words: 3,
            transition_phrases: default_transition_phrases(),
        }
    }
}

/// Bilingual (English/Korean) topic-transition markers.
pub fn default_transition_phrases() -> Vec<String> {
    [
        "by the way",
        "however",
        "meanwhile",
        "also",
        "그런데",
        "그리고",
        "한편",
        "그래서",
        "하지만",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Human typing cadence applied before each chunk is sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    pub min_chars_per_sec: f64,
    pub max_chars_per_sec: f64,
    pub min_overhead_ms: u64,
    pub max_overhead_ms: u64,
    /// Floor applied after the typing estimate. Defaults to 300ms.
    pub min_delay_ms: u64,
    /// Cap applied after the typing estimate. Defaults to 3000ms.
    pub max_delay_ms: u64,
    /// Send the channel's "typing" indicator before each paced chunk.
    pub typing_indicator: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_chars_per_sec: 15.0,
            max_chars_per_sec: 25.0,
            min_overhead_ms: 200,
            max_overhead_ms: 500,
            min_delay_ms: 300,
            max_delay_ms: 3000,
            typing_indicator: true,
        }
    }
}

/// What to do when a per-target delivery queue is full.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the pending chunk with the lowest sequence number.
    #[default]
    DropOldest,
    /// Refuse the new chunk.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum pending chunks per delivery target. Defaults to 64.
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
    /// Seconds between queue status reports. 0 disables reporting and
    /// idle eviction. Defaults to 30.
    pub status_interval_secs: u64,
    /// Targets with an empty queue and no activity for this many seconds
    /// give up their queue, worker and conversation state. 0 keeps them
    /// forever. Defaults to 1800.
    pub idle_evict_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            overflow: OverflowPolicy::default(),
            status_interval_secs: 30,
            idle_evict_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversationConfig {
    /// Summarize the conversation every N inbound messages. Defaults to 5.
    pub summary_every: u64,
    /// Transcript turns sent to the model with each request. Defaults to 10.
    pub history_limit: u32,
    /// Transcript turns fed to the summarizer. Defaults to 30.
    pub summary_history_limit: u32,
    /// Share of script-specific characters above which a message is
    /// attributed to that script's language. Defaults to 0.3.
    pub language_threshold: f64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            summary_every: 5,
            history_limit: 10,
            summary_history_limit: 30,
            language_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PersonaConfig {
    /// System prompt template. `{user_name}` is replaced with `user_name`.
    pub system_prompt: String,
    pub user_name: Option<String>,
    /// Sent in place of a reply when generation fails.
    pub fallback_message: String,
    pub reply_timeout_secs: u64,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a friendly English conversation partner chatting with \
                            {user_name} over text messages. Keep replies short and \
                            conversational, correct grammar gently in the flow of the \
                            conversation, and do not greet again if the history shows the \
                            conversation is already under way."
                .into(),
            user_name: None,
            fallback_message: "Sorry, I'm having trouble thinking right now. Let's try again \
                               in a bit."
                .into(),
            reply_timeout_secs: 60,
        }
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub summary_max_tokens: u32,
    pub summary_temperature: f32,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            summary_max_tokens: 300,
            summary_temperature: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    /// SQLite database for transcript, summaries and profile. Defaults to
    /// `<data dir>/memory.db`.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub imessage: IMessageConfig,
    pub telegram: TelegramConfig,
}

/// macOS Messages bridge (chat.db polling + AppleScript sending).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IMessageConfig {
    pub enabled: bool,
    /// Phone number or Apple ID email of the single conversation partner.
    pub target: Option<String>,
    /// Defaults to `~/Library/Messages/chat.db`.
    pub db_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
    /// Service used when an inbound message carries no hint.
    pub service: String,
}

impl Default for IMessageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target: None,
            db_path: None,
            poll_interval_ms: 1000,
            service: "iMessage".into(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    /// Bot token from @BotFather.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<Secret<String>>,
    /// User id / username allowlist. Empty means everyone.
    pub allowlist: Vec<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enabled", &self.enabled)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("allowlist", &self.allowlist)
            .finish()
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_str(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RingleConfig::default();
        assert_eq!(cfg.segmenter.short_response_words, 5);
        assert_eq!(cfg.segmenter.max_segment_chars, 200);
        assert_eq!(cfg.segmenter.min_fragment_words, 3);
        assert_eq!(cfg.pacing.min_delay_ms, 300);
        assert_eq!(cfg.pacing.max_delay_ms, 3000);
        assert_eq!(cfg.conversation.summary_every, 5);
        assert_eq!(cfg.delivery.overflow, OverflowPolicy::DropOldest);
        assert_eq!(cfg.delivery.status_interval_secs, 30);
        assert_eq!(cfg.delivery.idle_evict_secs, 1800);
        assert!(!cfg.channels.imessage.enabled);
        assert!(!cfg.channels.telegram.enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: RingleConfig = toml::from_str(
            r#"
            [delivery]
            overflow = "reject"

            [channels.telegram]
            enabled = true
            token = "123:ABC"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.delivery.overflow, OverflowPolicy::Reject);
        assert_eq!(cfg.delivery.queue_capacity, 64);
        assert_eq!(
            cfg.channels.telegram.token.as_ref().unwrap().expose_secret(),
            "123:ABC"
        );
        assert_eq!(cfg.segmenter.transition_phrases.len(), 9);
    }

    #[test]
    fn so_and_but_are_korean_only_markers() {
        // "so" and "but" open too many ordinary English clauses to split on.
        let phrases = default_transition_phrases();
        assert!(!phrases.iter().any(|p| p == "so" || p == "but"));
        assert!(phrases.iter().any(|p| p == "그래서"));
        assert!(phrases.iter().any(|p| p == "하지만"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = ProviderConfig {
            api_key: Some(Secret::new("sk-live".into())),
            ..Default::default()
        };
        let out = format!("{cfg:?}");
        assert!(!out.contains("sk-live"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn serialize_roundtrip_keeps_secret() {
        let mut cfg = RingleConfig::default();
        cfg.provider.api_key = Some(Secret::new("sk-test".into()));
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let back: RingleConfig = toml::from_str(&raw).unwrap();
        assert_eq!(
            back.provider.api_key.as_ref().unwrap().expose_secret(),
            "sk-test"
        );
    }
}

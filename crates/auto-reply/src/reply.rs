//! Reply generation with a fixed fallback.
//!
//! A failed, timed-out or empty completion is a `GenerationFailure`: it is
//! logged and replaced by the fallback text, which is then delivered like
//! any other reply.

use std::time::Duration;

use {
    ringle_common::{ChatRole, HistoryEntry},
    ringle_providers::{ChatMessage, CompletionOptions, LlmProvider},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{conversation as conv_metrics, counter, labels};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub text: String,
    /// `text` is the fallback message.
    pub fallback: bool,
}

/// System prompt followed by the transcript, oldest first.
pub fn build_messages(system_prompt: &str, history: &[HistoryEntry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().map(|entry| match entry.role {
        ChatRole::User => ChatMessage::user(&entry.content),
        ChatRole::Assistant => ChatMessage::assistant(&entry.content),
    }));
    messages
}

pub async fn generate_reply(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    history: &[HistoryEntry],
    timeout: Duration,
    fallback: &str,
) -> ReplyOutcome {
    let messages = build_messages(system_prompt, history);
    let options = CompletionOptions::default();

    let failure = match tokio::time::timeout(timeout, provider.complete(&messages, &options)).await
    {
        Ok(Ok(resp)) => match resp.text.map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => {
                debug!(
                    model = provider.id(),
                    input_tokens = resp.usage.input_tokens,
                    output_tokens = resp.usage.output_tokens,
                    "reply generated"
                );
                return ReplyOutcome {
                    text,
                    fallback: false,
                };
            },
            _ => "empty completion".to_string(),
        },
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}s", timeout.as_secs()),
    };

    warn!(model = provider.id(), error = %failure, "GenerationFailure: using fallback reply");
    #[cfg(feature = "metrics")]
    counter!(conv_metrics::FALLBACKS_TOTAL, labels::MODEL => provider.id().to_string()).increment(1);
    ReplyOutcome {
        text: fallback.to_string(),
        fallback: true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use {async_trait::async_trait, ringle_providers::CompletionResponse};

    use super::*;

    pub(crate) enum Script {
        Reply(&'static str),
        Fail,
        Hang,
    }

    /// Provider that answers from a script and records the messages it got.
    pub(crate) struct ScriptedProvider {
        pub script: Mutex<Vec<Script>>,
        pub seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        pub fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn id(&self) -> &str {
            "scripted-1"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> anyhow::Result<CompletionResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.is_empty() {
                    Script::Fail
                } else {
                    script.remove(0)
                }
            };
            match next {
                Script::Reply(text) => Ok(CompletionResponse {
                    text: Some(text.to_string()),
                    ..Default::default()
                }),
                Script::Fail => anyhow::bail!("HTTP 500"),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    anyhow::bail!("unreachable")
                },
            }
        }
    }

    const FALLBACK: &str = "Sorry, try again later.";

    #[test]
    fn messages_start_with_system_prompt() {
        let history = vec![HistoryEntry::user("hi"), HistoryEntry::assistant("hello!")];
        let msgs = build_messages("be nice", &history);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role(), "system");
        assert_eq!(msgs[1].role(), "user");
        assert_eq!(msgs[2].role(), "assistant");
        assert_eq!(msgs[2].content(), "hello!");
    }

    #[tokio::test]
    async fn successful_reply_is_trimmed() {
        let provider = ScriptedProvider::new(vec![Script::Reply("  Great question!\n")]);
        let out = generate_reply(
            &provider,
            "sys",
            &[HistoryEntry::user("q")],
            Duration::from_secs(5),
            FALLBACK,
        )
        .await;
        assert_eq!(out, ReplyOutcome {
            text: "Great question!".into(),
            fallback: false,
        });
    }

    #[tokio::test]
    async fn provider_error_uses_fallback() {
        let provider = ScriptedProvider::new(vec![Script::Fail]);
        let out = generate_reply(&provider, "sys", &[], Duration::from_secs(5), FALLBACK).await;
        assert!(out.fallback);
        assert_eq!(out.text, FALLBACK);
    }

    #[tokio::test]
    async fn blank_reply_uses_fallback() {
        let provider = ScriptedProvider::new(vec![Script::Reply("   ")]);
        let out = generate_reply(&provider, "sys", &[], Duration::from_secs(5), FALLBACK).await;
        assert!(out.fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_uses_fallback() {
        let provider = ScriptedProvider::new(vec![Script::Hang]);
        let out = generate_reply(&provider, "sys", &[], Duration::from_secs(60), FALLBACK).await;
        assert!(out.fallback);
        assert_eq!(out.text, FALLBACK);
    }
}

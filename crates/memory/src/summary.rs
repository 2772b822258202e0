//! Rolling conversation summaries for mid-term memory.

use std::sync::Arc;

use {
    ringle_common::{ChatRole, HistoryEntry},
    ringle_providers::{ChatMessage, CompletionOptions, LlmProvider},
    tracing::{debug, warn},
};

use crate::schema::SummaryRow;

/// The latest summary and its key points, rendered into the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryContext {
    pub summary: String,
    pub key_points: Vec<String>,
}

impl SummaryContext {
    pub fn new(summary: impl Into<String>, key_points: Vec<String>) -> Self {
        Self {
            summary: summary.into(),
            key_points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
    }

    /// Prompt block: summary, then key points as a bulleted list. Empty when
    /// there is no summary yet.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut out = format!("\n\n[Previous Conversation Summary]\n{}", self.summary);
        if !self.key_points.is_empty() {
            out.push_str("\n\n[Key Learning Points]\n");
            let points: Vec<String> = self.key_points.iter().map(|p| format!("- {p}")).collect();
            out.push_str(&points.join("\n"));
        }
        out
    }
}

impl From<SummaryRow> for SummaryContext {
    fn from(row: SummaryRow) -> Self {
        Self {
            summary: row.summary,
            key_points: row.key_points,
        }
    }
}

/// Produces summaries and key learning points through a language model.
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                max_tokens: Some(max_tokens),
                temperature: Some(temperature),
            },
        }
    }

    /// A short summary of `history`. Empty on provider failure or when there
    /// is nothing to summarize.
    pub async fn summarize(&self, history: &[HistoryEntry]) -> String {
        if history.is_empty() {
            return String::new();
        }
        let prompt = format!(
            "Below is a conversation between an English tutor and a student.\n\
             Summarize it in under 200 characters. Include:\n\
             - the main topics practised\n\
             - questions or mistakes the student made\n\
             - feedback the tutor gave\n\
             - where the conversation currently stands\n\n\
             Conversation:\n{}\n\nSummary:",
            transcript(history)
        );
        match self.ask(prompt).await {
            Some(text) => {
                debug!(chars = text.chars().count(), "summary generated");
                text
            },
            None => String::new(),
        }
    }

    /// Three to five one-line learning points. Empty on provider failure.
    pub async fn key_points(&self, history: &[HistoryEntry]) -> Vec<String> {
        if history.is_empty() {
            return Vec::new();
        }
        let prompt = format!(
            "Extract 3-5 key learning points from this English practice \
             conversation. Write each point on its own line.\n\n\
             Conversation:\n{}\n\nLearning points (one per line):",
            transcript(history)
        );
        let Some(text) = self.ask(prompt).await else {
            return Vec::new();
        };
        let points: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        debug!(count = points.len(), "key points extracted");
        points
    }

    async fn ask(&self, prompt: String) -> Option<String> {
        match self
            .provider
            .complete(&[ChatMessage::user(prompt)], &self.options)
            .await
        {
            Ok(resp) => resp.text.map(|t| t.trim().to_string()),
            Err(e) => {
                warn!(error = %e, model = self.provider.id(), "summarization request failed");
                None
            },
        }
    }
}

fn transcript(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| {
            let speaker = match entry.role {
                ChatRole::User => "Student",
                ChatRole::Assistant => "Tutor",
            };
            format!("{speaker}: {}", entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        ringle_providers::CompletionResponse,
        std::sync::Mutex,
    };

    struct Scripted {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<(String, CompletionOptions)>>,
    }

    impl Scripted {
        fn new(reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn id(&self) -> &str {
            "scripted-1"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            options: &CompletionOptions,
        ) -> anyhow::Result<CompletionResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push((messages[0].content().to_string(), *options));
            match self.reply {
                Some(text) => Ok(CompletionResponse {
                    text: Some(text.to_string()),
                    ..Default::default()
                }),
                None => anyhow::bail!("service unavailable"),
            }
        }
    }

    fn history() -> Vec<HistoryEntry> {
        vec![
            HistoryEntry::user("I goed to the park"),
            HistoryEntry::assistant("Nice! We say \"I went to the park\"."),
        ]
    }

    #[test]
    fn render_empty_is_empty() {
        assert_eq!(SummaryContext::default().render(), "");
        assert_eq!(SummaryContext::new("  ", vec!["x".into()]).render(), "");
    }

    #[test]
    fn render_with_points() {
        let ctx = SummaryContext::new("Talked about the weekend.", vec![
            "irregular past tense".into(),
            "went vs goed".into(),
        ]);
        assert_eq!(
            ctx.render(),
            "\n\n[Previous Conversation Summary]\nTalked about the weekend.\
             \n\n[Key Learning Points]\n- irregular past tense\n- went vs goed"
        );
    }

    #[test]
    fn render_without_points() {
        let ctx = SummaryContext::new("Short chat.", Vec::new());
        assert_eq!(ctx.render(), "\n\n[Previous Conversation Summary]\nShort chat.");
    }

    #[tokio::test]
    async fn summarize_uses_options_and_transcript() {
        let provider = Scripted::new(Some("  Practised past tense.  "));
        let summarizer = Summarizer::new(provider.clone(), 300, 0.3);
        assert_eq!(summarizer.summarize(&history()).await, "Practised past tense.");

        let prompts = provider.prompts.lock().unwrap();
        let (prompt, options) = &prompts[0];
        assert!(prompt.contains("Student: I goed to the park"));
        assert!(prompt.contains("Tutor: Nice!"));
        assert_eq!(options.max_tokens, Some(300));
        assert_eq!(options.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn key_points_drop_blank_lines() {
        let provider = Scripted::new(Some("went, not goed\n\n  park vocabulary \n"));
        let summarizer = Summarizer::new(provider, 300, 0.3);
        assert_eq!(summarizer.key_points(&history()).await, vec![
            "went, not goed",
            "park vocabulary"
        ]);
    }

    #[tokio::test]
    async fn failures_yield_empty() {
        let summarizer = Summarizer::new(Scripted::new(None), 300, 0.3);
        assert_eq!(summarizer.summarize(&history()).await, "");
        assert!(summarizer.key_points(&history()).await.is_empty());
    }

    #[tokio::test]
    async fn empty_history_skips_provider() {
        let provider = Scripted::new(Some("unused"));
        let summarizer = Summarizer::new(provider.clone(), 300, 0.3);
        assert_eq!(summarizer.summarize(&[]).await, "");
        assert!(provider.prompts.lock().unwrap().is_empty());
    }
}

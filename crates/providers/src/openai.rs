use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{counter, histogram, labels, llm as llm_metrics};

use crate::model::{ChatMessage, CompletionOptions, CompletionResponse, LlmProvider, Usage};

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages.iter().map(ChatMessage::to_openai_value).collect::<Vec<_>>(),
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = f64::from(temperature).into();
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> anyhow::Result<CompletionResponse> {
        let body = self.request_body(messages, options);
        debug!(
            model = %self.model,
            messages_count = messages.len(),
            "openai complete request"
        );
        trace!(body = %body, "openai request body");

        let started = Instant::now();
        let result = self.send(&body).await;

        #[cfg(feature = "metrics")]
        {
            let model = self.model.clone();
            counter!(llm_metrics::COMPLETIONS_TOTAL, labels::MODEL => model.clone()).increment(1);
            histogram!(llm_metrics::COMPLETION_DURATION_SECONDS, labels::MODEL => model.clone())
                .record(started.elapsed().as_secs_f64());
            if result.is_err() {
                counter!(llm_metrics::COMPLETION_ERRORS_TOTAL, labels::MODEL => model)
                    .increment(1);
            }
        }
        debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "openai complete finished"
        );
        result
    }
}

impl OpenAiProvider {
    async fn send(&self, body: &serde_json::Value) -> anyhow::Result<CompletionResponse> {
        let http_resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, model = %self.model, body = %body_text, "openai API error");
            anyhow::bail!("OpenAI API error HTTP {status}: {body_text}");
        }

        let resp = http_resp.json::<serde_json::Value>().await?;
        trace!(response = %resp, "openai raw response");
        Ok(parse_completion(&resp))
    }
}

fn parse_completion(resp: &serde_json::Value) -> CompletionResponse {
    let text = resp["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let usage = &resp["usage"];
    let field = |name: &str| {
        usage[name]
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    CompletionResponse {
        text,
        usage: Usage {
            input_tokens: field("prompt_tokens"),
            output_tokens: field("completion_tokens"),
        },
    }
}

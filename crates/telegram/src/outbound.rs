use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    ringle_channels::ChannelOutbound,
    teloxide::{
        RequestError,
        prelude::*,
        types::{ChatAction, ChatId},
    },
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{channels as ch_metrics, counter, labels};

use crate::{
    error::{Result, TelegramError},
    text::{TELEGRAM_MAX_MESSAGE_LEN, chunk_message},
};

const RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends chunks to Telegram chats.
///
/// Each delivery-queue chunk is normally well under Telegram's size limit;
/// anything longer is split at line or word boundaries.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_chunks(&self, to: &str, text: &str) -> Result<()> {
        let chat_id = parse_chat_id(to)?;
        let chunks = chunk_message(text, TELEGRAM_MAX_MESSAGE_LEN);
        for chunk in &chunks {
            run_with_retry(to, "send message", || {
                let req = self.bot.send_message(chat_id, chunk.as_str());
                async move { req.await }
            })
            .await?;
        }
        debug!(chat_id = to, text_len = text.len(), parts = chunks.len(), "telegram message sent");
        Ok(())
    }
}

pub fn parse_chat_id(to: &str) -> Result<ChatId> {
    to.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| TelegramError::InvalidChatId(to.to_string()))
}

/// Run `request`, waiting out `RetryAfter` responses a bounded number of
/// times. Other errors are returned immediately.
async fn run_with_retry<T, F, Fut>(
    to: &str,
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;
    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };
                if retries >= RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id = to,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }
                retries += 1;
                warn!(
                    chat_id = to,
                    operation,
                    retries,
                    max_retries = RETRY_AFTER_MAX_RETRIES,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        _service_hint: Option<&str>,
    ) -> ringle_channels::Result<()> {
        match self.send_chunks(to, text).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::MESSAGES_SENT_TOTAL, labels::CHANNEL => crate::CHANNEL_ID)
                    .increment(1);
                Ok(())
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::ERRORS_TOTAL, labels::CHANNEL => crate::CHANNEL_ID).increment(1);
                Err(e.into())
            },
        }
    }

    async fn send_typing(&self, to: &str) -> ringle_channels::Result<()> {
        let chat_id = parse_chat_id(to)?;
        self.bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .map_err(TelegramError::from)?;
        Ok(())
    }
}

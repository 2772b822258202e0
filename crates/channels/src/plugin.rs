use {async_trait::async_trait, ringle_common::InboundMessage, tokio::sync::mpsc};

use crate::Result;

/// Send messages to a channel.
///
/// `to` is the chat/peer id inside the channel. `service_hint` lets a
/// transport pick a sub-service (SMS vs iMessage); transports without
/// sub-services ignore it.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str, service_hint: Option<&str>) -> Result<()>;

    /// Send a "typing" indicator. No-op by default.
    async fn send_typing(&self, _to: &str) -> Result<()> {
        Ok(())
    }
}

/// A row read from a polled message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledMessage {
    /// Monotonic cursor of the row (chat.db ROWID).
    pub cursor: i64,
    pub text: String,
    pub service_hint: Option<String>,
}

/// A channel whose inbound messages are fetched by polling a store.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Cursor of the newest message currently stored. Polling starts here so
    /// that history is not replayed on startup.
    async fn latest_cursor(&self) -> Result<i64>;

    /// Messages from the conversation partner with a cursor above `since`,
    /// oldest first.
    async fn poll(&self, since: i64) -> Result<Vec<PolledMessage>>;
}

/// Receives normalized inbound messages from every channel.
#[async_trait]
pub trait InboundSink: Send + Sync {
    async fn dispatch(&self, message: InboundMessage);
}

#[async_trait]
impl InboundSink for mpsc::Sender<InboundMessage> {
    async fn dispatch(&self, message: InboundMessage) {
        if self.send(message).await.is_err() {
            tracing::debug!("inbound receiver closed, dropping message");
        }
    }
}

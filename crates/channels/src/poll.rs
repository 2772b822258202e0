use std::{sync::Arc, time::Duration};

use {
    ringle_common::{InboundMessage, ReplyTarget},
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{channels as ch_metrics, counter, labels};

use crate::plugin::{InboundSink, MessageSource};

/// Poll `source` every `interval` and forward new messages to `sink` as
/// inbound messages addressed from `target`.
///
/// The cursor starts at the newest stored message, so only messages that
/// arrive after startup are forwarded. Poll errors are logged and retried on
/// the next tick. The task ends when `cancel` fires.
pub fn spawn_poll_loop(
    source: Arc<dyn MessageSource>,
    target: ReplyTarget,
    interval: Duration,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut cursor = loop {
            match source.latest_cursor().await {
                Ok(c) => break c,
                Err(e) => {
                    warn!(channel = %target.channel, error = %e, "failed to read initial cursor");
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(interval) => {},
                    }
                },
            }
        };
        info!(channel = %target.channel, cursor, "message poller started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }

            let batch = match source.poll(cursor).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(channel = %target.channel, error = %e, "poll failed");
                    #[cfg(feature = "metrics")]
                    counter!(ch_metrics::POLL_ERRORS_TOTAL, labels::CHANNEL => target.channel.clone())
                        .increment(1);
                    continue;
                },
            };

            for row in batch {
                if row.cursor <= cursor {
                    continue;
                }
                cursor = row.cursor;
                if row.text.trim().is_empty() {
                    continue;
                }
                debug!(channel = %target.channel, cursor, "new inbound message");
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::MESSAGES_RECEIVED_TOTAL, labels::CHANNEL => target.channel.clone())
                    .increment(1);

                let mut msg = InboundMessage::new(row.cursor.to_string(), target.clone(), row.text);
                if let Some(hint) = row.service_hint {
                    msg = msg.with_service_hint(hint);
                }
                sink.dispatch(msg).await;
            }
        }
        info!(channel = %target.channel, "message poller stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{Error, Result, plugin::PolledMessage},
        async_trait::async_trait,
        std::sync::Mutex,
        tokio::sync::mpsc,
    };

    /// In-memory store: rows become visible once pushed.
    #[derive(Default)]
    struct FakeStore {
        rows: Mutex<Vec<PolledMessage>>,
        fail_next: Mutex<bool>,
    }

    impl FakeStore {
        fn push(&self, cursor: i64, text: &str, hint: Option<&str>) {
            self.rows.lock().unwrap().push(PolledMessage {
                cursor,
                text: text.into(),
                service_hint: hint.map(String::from),
            });
        }
    }

    #[async_trait]
    impl MessageSource for FakeStore {
        async fn latest_cursor(&self) -> Result<i64> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.cursor)
                .max()
                .unwrap_or(0))
        }

        async fn poll(&self, since: i64) -> Result<Vec<PolledMessage>> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(Error::unavailable("database is locked"));
            }
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.cursor > since)
                .cloned()
                .collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn forwards_only_new_messages() {
        let store = Arc::new(FakeStore::default());
        store.push(7, "old history", None);

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = spawn_poll_loop(
            store.clone(),
            ReplyTarget::new("imessage", "+15550001111"),
            Duration::from_millis(1000),
            Arc::new(tx),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        store.push(8, "hi there", Some("SMS"));
        store.push(9, "   ", None);
        store.push(10, "are you around?", None);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.id, "8");
        assert_eq!(first.text, "hi there");
        assert_eq!(first.service_hint.as_deref(), Some("SMS"));
        assert_eq!(first.target.chat_id, "+15550001111");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.id, "10");

        cancel.cancel();
        handle.await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn survives_poll_errors() {
        let store = Arc::new(FakeStore::default());
        *store.fail_next.lock().unwrap() = true;
        store.push(1, "first", None);

        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = spawn_poll_loop(
            store.clone(),
            ReplyTarget::new("imessage", "me"),
            Duration::from_millis(500),
            Arc::new(tx),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        store.push(2, "after error", None);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.text, "after error");

        cancel.cancel();
        handle.await.unwrap();
    }
}

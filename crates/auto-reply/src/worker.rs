//! Single consumer for one delivery queue.
//!
//! The worker suspends only while waiting for the next item and while
//! sleeping out the pacing delay; both waits end promptly on cancellation.
//! A send that has started is always allowed to finish.

use std::sync::Arc;

use {
    ringle_channels::ChannelOutbound,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{counter, delivery as delivery_metrics, histogram, labels};

use crate::{
    pacing::PacingModel,
    queue::{ChunkItem, DeliveryQueue, Dequeued, Outcome},
};

pub struct DeliveryWorker {
    queue: DeliveryQueue,
    outbound: Arc<dyn ChannelOutbound>,
    pacing: Arc<PacingModel>,
    typing_indicator: bool,
}

impl DeliveryWorker {
    pub fn new(
        queue: DeliveryQueue,
        outbound: Arc<dyn ChannelOutbound>,
        pacing: Arc<PacingModel>,
    ) -> Self {
        Self {
            queue,
            outbound,
            pacing,
            typing_indicator: false,
        }
    }

    /// Send a typing indicator before each paced delay.
    #[must_use]
    pub fn with_typing_indicator(mut self, enabled: bool) -> Self {
        self.typing_indicator = enabled;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!("delivery worker started");
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = self.queue.next() => next,
            };

            let item = match next {
                Dequeued::Stale(item) => {
                    debug!(
                        target = %item.target,
                        seq = item.seq,
                        session = item.session_id,
                        watermark = self.queue.watermark(),
                        "skipping stale chunk"
                    );
                    #[cfg(feature = "metrics")]
                    counter!(
                        delivery_metrics::CHUNKS_STALE_TOTAL,
                        labels::CHANNEL => item.target.channel.clone()
                    )
                    .increment(1);
                    continue;
                },
                Dequeued::Live(item) => item,
            };

            if !self.deliver(&item, &cancel).await {
                self.queue.finish(&item, Outcome::Dropped);
                break;
            }
        }
        info!("delivery worker stopped");
    }

    /// Pace and send one live item. Returns `false` if cancelled before the
    /// send started.
    async fn deliver(&self, item: &ChunkItem, cancel: &CancellationToken) -> bool {
        let to = item.target.chat_id.as_str();

        if self.typing_indicator
            && let Err(e) = self.outbound.send_typing(to).await
        {
            debug!(target = %item.target, error = %e, "typing indicator failed");
        }

        let delay = self.pacing.delay_for(&item.text);
        #[cfg(feature = "metrics")]
        histogram!(delivery_metrics::PACING_DELAY_SECONDS).record(delay.as_secs_f64());
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(target = %item.target, seq = item.seq, "send abandoned during pacing");
                return false;
            },
            () = tokio::time::sleep(delay) => {},
        }

        match self
            .outbound
            .send_text(to, &item.text, item.service_hint.as_deref())
            .await
        {
            Ok(()) => {
                debug!(
                    target = %item.target,
                    seq = item.seq,
                    session = item.session_id,
                    delay_ms = delay.as_millis() as u64,
                    "chunk delivered"
                );
                #[cfg(feature = "metrics")]
                counter!(
                    delivery_metrics::CHUNKS_DELIVERED_TOTAL,
                    labels::CHANNEL => item.target.channel.clone()
                )
                .increment(1);
                self.queue.finish(item, Outcome::Delivered);
            },
            Err(e) => {
                warn!(
                    target = %item.target,
                    seq = item.seq,
                    session = item.session_id,
                    error = %e,
                    "TransportFailure: chunk dropped"
                );
                #[cfg(feature = "metrics")]
                counter!(
                    delivery_metrics::CHUNKS_FAILED_TOTAL,
                    labels::CHANNEL => item.target.channel.clone(),
                    labels::ERROR_TYPE => e.kind()
                )
                .increment(1);
                self.queue.finish(item, Outcome::Dropped);
            },
        }
        true
    }
}

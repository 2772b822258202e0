//! One delivery queue and one worker per reply target.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use {
    ringle_channels::ChannelRegistry,
    ringle_common::ReplyTarget,
    ringle_config::{DeliveryConfig, PacingConfig},
    tokio::{sync::watch, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{counter, delivery as delivery_metrics, gauge, labels};

use crate::{
    error::Result,
    pacing::PacingModel,
    queue::{DeliveryQueue, QueueStatus},
    worker::DeliveryWorker,
};

/// Per-target queue snapshot, sorted by target key.
pub type HubStatus = Vec<(ReplyTarget, QueueStatus)>;

/// A target's queue and the worker draining it.
struct Lane {
    queue: DeliveryQueue,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

/// Queues and workers keyed by target, created on first use.
pub struct DeliveryHub {
    registry: ChannelRegistry,
    pacing: Arc<PacingModel>,
    delivery: DeliveryConfig,
    typing_indicator: bool,
    cancel: CancellationToken,
    lanes: Mutex<HashMap<ReplyTarget, Lane>>,
    reports: watch::Sender<HubStatus>,
}

impl DeliveryHub {
    pub fn new(
        registry: ChannelRegistry,
        pacing: &PacingConfig,
        delivery: DeliveryConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            pacing: Arc::new(PacingModel::new(pacing)),
            delivery,
            typing_indicator: pacing.typing_indicator,
            cancel,
            lanes: Mutex::new(HashMap::new()),
            reports: watch::channel(Vec::new()).0,
        }
    }

    /// The queue for `target`, spawning its worker on first use. Fails if no
    /// transport is registered for the target's channel.
    pub fn queue_for(&self, target: &ReplyTarget) -> Result<DeliveryQueue> {
        let mut lanes = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(lane) = lanes.get(target) {
            return Ok(lane.queue.clone());
        }

        let outbound = self.registry.resolve(&target.channel)?;
        let queue = DeliveryQueue::new(self.delivery.queue_capacity, self.delivery.overflow);
        let cancel = self.cancel.child_token();
        let worker = DeliveryWorker::new(queue.clone(), outbound, Arc::clone(&self.pacing))
            .with_typing_indicator(self.typing_indicator)
            .spawn(cancel.clone());
        info!(target = %target, capacity = self.delivery.queue_capacity, "delivery queue created");

        lanes.insert(target.clone(), Lane {
            queue: queue.clone(),
            cancel,
            worker,
        });
        Ok(queue)
    }

    /// Snapshot of every queue, sorted by target key.
    pub fn status(&self) -> HubStatus {
        let lanes = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out: HubStatus = lanes
            .iter()
            .map(|(target, lane)| (target.clone(), lane.queue.status()))
            .collect();
        drop(lanes);
        out.sort_by_key(|(target, _)| target.key());
        out
    }

    /// Take a snapshot, export it as gauges and publish it to subscribers.
    pub fn report(&self) -> HubStatus {
        let status = self.status();

        let mut depth: BTreeMap<&str, usize> =
            self.registry.list().into_iter().map(|c| (c, 0)).collect();
        for (target, s) in &status {
            *depth.entry(target.channel.as_str()).or_default() += s.pending;
        }
        for (channel, pending) in &depth {
            debug!(channel, pending, "delivery queue depth");
            #[cfg(feature = "metrics")]
            gauge!(
                delivery_metrics::QUEUE_DEPTH,
                labels::CHANNEL => channel.to_string()
            )
            .set(*pending as f64);
        }
        #[cfg(feature = "metrics")]
        gauge!(delivery_metrics::ACTIVE_TARGETS).set(status.len() as f64);

        self.reports.send_replace(status.clone());
        status
    }

    /// Receives every snapshot published by [`DeliveryHub::report`].
    pub fn subscribe(&self) -> watch::Receiver<HubStatus> {
        self.reports.subscribe()
    }

    /// Release `target`'s queue and stop its worker if nothing is pending or
    /// in flight. Returns whether the target no longer holds a lane.
    pub fn evict(&self, target: &ReplyTarget) -> bool {
        let mut lanes = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(lane) = lanes.get(target) else {
            return true;
        };
        let status = lane.queue.status();
        if status.pending > 0 || status.in_flight.is_some() {
            return false;
        }
        if let Some(lane) = lanes.remove(target) {
            lane.cancel.cancel();
            debug!(target = %target, delivered = status.delivered, "delivery queue released");
            #[cfg(feature = "metrics")]
            counter!(
                delivery_metrics::TARGETS_EVICTED_TOTAL,
                labels::CHANNEL => target.channel.clone()
            )
            .increment(1);
        }
        true
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop every worker and wait for them to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let lanes: Vec<Lane> = self
            .lanes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain()
            .map(|(_, lane)| lane)
            .collect();
        let count = lanes.len();
        for lane in lanes {
            if let Err(e) = lane.worker.await {
                warn!(error = %e, "delivery worker panicked");
            }
        }
        info!(workers = count, "delivery hub stopped");
    }
}

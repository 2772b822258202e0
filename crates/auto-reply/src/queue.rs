//! Per-target delivery queue.
//!
//! Items are ordered by priority, then by sequence number (FIFO within a
//! priority). Every item is tagged with a session id; the queue's watermark
//! is the current session, and items tagged with an older session are
//! skipped when they reach the head instead of being removed on
//! interruption. The watermark is a single atomic shared by producers and
//! the one consumer.

use std::{
    cmp::Ordering as CmpOrdering,
    collections::{BinaryHeap, HashMap},
    pin::pin,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    ringle_common::{ReplyTarget, SessionId},
    ringle_config::OverflowPolicy,
    tokio::sync::Notify,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{counter, delivery as delivery_metrics, labels};

use crate::{error::QueueError, state::SessionWatermark};

/// Lower value = more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Interactive replies.
    High = 1,
    Normal = 2,
    /// Background and system notes.
    Low = 3,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

/// One deliverable chunk. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkItem {
    pub priority: Priority,
    pub seq: u64,
    pub session_id: SessionId,
    pub target: ReplyTarget,
    pub text: String,
    pub service_hint: Option<String>,
}

/// Result of taking the head of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeued {
    /// Current session; now in flight and must be passed to
    /// [`DeliveryQueue::finish`].
    Live(ChunkItem),
    /// Superseded session; already accounted for, never sent.
    Stale(ChunkItem),
}

/// Terminal outcome of an in-flight item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Dropped,
}

/// Snapshot of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: usize,
    /// Sequence number of the item being paced or sent.
    pub in_flight: Option<u64>,
    pub watermark: SessionId,
    pub delivered: u64,
    /// Transport failures and sends abandoned at shutdown.
    pub dropped: u64,
    /// Skipped because their session was superseded.
    pub stale: u64,
    /// Removed or refused because the queue was full.
    pub evicted: u64,
}

/// Heap entry: max-heap order is reversed so the smallest
/// `(priority, seq)` pops first.
#[derive(Debug)]
struct Queued(ChunkItem);

impl Queued {
    fn key(&self) -> (Priority, u64) {
        (self.0.priority, self.0.seq)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.key().cmp(&self.key())
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    in_flight: Option<u64>,
    /// Non-terminal items per session.
    outstanding: HashMap<SessionId, usize>,
    delivered: u64,
    dropped: u64,
    stale: u64,
    evicted: u64,
}

impl QueueState {
    fn settle(&mut self, session: SessionId) {
        if let Some(n) = self.outstanding.get_mut(&session) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.outstanding.remove(&session);
            }
        }
    }
}

struct Shared {
    state: Mutex<QueueState>,
    watermark: AtomicU64,
    /// Wakes the consumer when an item is pushed.
    available: Notify,
    /// Wakes `settled` waiters when an item reaches a terminal state.
    settled: Notify,
    capacity: usize,
    overflow: OverflowPolicy,
}

/// Cloneable handle; all clones share one queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("status", &self.status())
            .finish()
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new(64, OverflowPolicy::DropOldest)
    }
}

impl DeliveryQueue {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                watermark: AtomicU64::new(0),
                available: Notify::new(),
                settled: Notify::new(),
                capacity: capacity.max(1),
                overflow,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn watermark(&self) -> SessionId {
        self.shared.watermark.load(Ordering::SeqCst)
    }

    /// Enqueue under the current watermark. Returns the sequence number.
    pub fn enqueue(
        &self,
        priority: Priority,
        target: ReplyTarget,
        text: impl Into<String>,
        service_hint: Option<String>,
    ) -> Result<u64, QueueError> {
        self.enqueue_tagged(self.watermark(), priority, target, text, service_hint)
    }

    /// Enqueue tagged with an explicit session (normally one returned by
    /// [`start_new_session`](Self::start_new_session)).
    pub fn enqueue_tagged(
        &self,
        session_id: SessionId,
        priority: Priority,
        target: ReplyTarget,
        text: impl Into<String>,
        service_hint: Option<String>,
    ) -> Result<u64, QueueError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QueueError::EmptyChunk);
        }

        let mut state = self.lock();
        if state.heap.len() >= self.shared.capacity {
            self.make_room(&mut state)?;
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        *state.outstanding.entry(session_id).or_default() += 1;
        debug!(
            target = %target,
            seq,
            session = session_id,
            priority = priority.as_str(),
            pending = state.heap.len() + 1,
            "chunk enqueued"
        );
        #[cfg(feature = "metrics")]
        counter!(
            delivery_metrics::CHUNKS_ENQUEUED_TOTAL,
            labels::CHANNEL => target.channel.clone(),
            labels::PRIORITY => priority.as_str()
        )
        .increment(1);

        state.heap.push(Queued(ChunkItem {
            priority,
            seq,
            session_id,
            target,
            text,
            service_hint,
        }));
        drop(state);
        self.shared.available.notify_one();
        Ok(seq)
    }

    /// Called with a full queue: purge stale items, then apply the overflow
    /// policy if still full.
    fn make_room(&self, state: &mut QueueState) -> Result<(), QueueError> {
        let watermark = self.watermark();
        let (keep, stale): (Vec<Queued>, Vec<Queued>) = std::mem::take(&mut state.heap)
            .into_vec()
            .into_iter()
            .partition(|q| q.0.session_id >= watermark);
        state.heap = BinaryHeap::from(keep);
        for q in &stale {
            state.stale += 1;
            state.settle(q.0.session_id);
        }
        if !stale.is_empty() {
            debug!(purged = stale.len(), watermark, "purged stale chunks from full queue");
        }

        if state.heap.len() < self.shared.capacity {
            self.shared.settled.notify_waiters();
            return Ok(());
        }

        match self.shared.overflow {
            OverflowPolicy::Reject => {
                warn!(capacity = self.shared.capacity, "delivery queue full, rejecting chunk");
                #[cfg(feature = "metrics")]
                counter!(delivery_metrics::CHUNKS_OVERFLOW_TOTAL, labels::POLICY => "reject")
                    .increment(1);
                state.evicted += 1;
                Err(QueueError::Full {
                    capacity: self.shared.capacity,
                })
            },
            OverflowPolicy::DropOldest => {
                let oldest = state.heap.iter().map(|q| q.0.seq).min();
                let mut evicted = None;
                state.heap.retain(|q| {
                    if Some(q.0.seq) == oldest {
                        evicted = Some(q.0.session_id);
                        false
                    } else {
                        true
                    }
                });
                if let Some(session) = evicted {
                    warn!(seq = oldest, session, "delivery queue full, evicted oldest chunk");
                    #[cfg(feature = "metrics")]
                    counter!(delivery_metrics::CHUNKS_OVERFLOW_TOTAL, labels::POLICY => "drop_oldest")
                        .increment(1);
                    state.evicted += 1;
                    state.settle(session);
                }
                self.shared.settled.notify_waiters();
                Ok(())
            },
        }
    }

    /// Advance the watermark; everything queued so far becomes stale.
    pub fn start_new_session(&self) -> SessionId {
        let session = self.shared.watermark.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(session, "watermark advanced");
        session
    }

    /// Number of pending items that will be skipped. Does not modify the
    /// queue.
    pub fn mark_stale_for_interruption(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        QueueStatus {
            pending: state.heap.len(),
            in_flight: state.in_flight,
            watermark: self.watermark(),
            delivered: state.delivered,
            dropped: state.dropped,
            stale: state.stale,
            evicted: state.evicted,
        }
    }

    /// Take the head without waiting.
    pub fn try_next(&self) -> Option<Dequeued> {
        let mut state = self.lock();
        let Queued(item) = state.heap.pop()?;
        if item.session_id < self.watermark() {
            state.stale += 1;
            state.settle(item.session_id);
            drop(state);
            self.shared.settled.notify_waiters();
            return Some(Dequeued::Stale(item));
        }
        state.in_flight = Some(item.seq);
        Some(Dequeued::Live(item))
    }

    /// Wait for and take the head. Cancel-safe: no item is lost if the
    /// future is dropped.
    pub async fn next(&self) -> Dequeued {
        loop {
            if let Some(dequeued) = self.try_next() {
                return dequeued;
            }
            self.shared.available.notified().await;
        }
    }

    /// Record the terminal outcome of a live item.
    pub fn finish(&self, item: &ChunkItem, outcome: Outcome) {
        let mut state = self.lock();
        if state.in_flight == Some(item.seq) {
            state.in_flight = None;
        }
        match outcome {
            Outcome::Delivered => state.delivered += 1,
            Outcome::Dropped => state.dropped += 1,
        }
        state.settle(item.session_id);
        drop(state);
        self.shared.settled.notify_waiters();
    }

    /// Items of `session` that have not reached a terminal state.
    pub fn outstanding(&self, session: SessionId) -> usize {
        self.lock().outstanding.get(&session).copied().unwrap_or(0)
    }

    /// Resolves once every item tagged with `session` is delivered, dropped,
    /// stale or evicted. Immediately ready if none were enqueued.
    pub async fn settled(&self, session: SessionId) {
        loop {
            let mut notified = pin!(self.shared.settled.notified());
            notified.as_mut().enable();
            if self.outstanding(session) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl SessionWatermark for DeliveryQueue {
    fn start_new_session(&self) -> SessionId {
        DeliveryQueue::start_new_session(self)
    }

    fn current_session(&self) -> SessionId {
        self.watermark()
    }
}

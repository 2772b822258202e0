//! Outbound delivery engine and the conversation pipeline around it.
//!
//! Flow: inbound message → conversation state (new session) → reply
//! generation → segmentation → per-target priority queue tagged with the
//! session → paced delivery by a single worker that skips chunks from
//! superseded sessions.

pub mod chunk;
pub mod error;
pub mod hub;
pub mod language;
pub mod pacing;
pub mod pipeline;
pub mod prompt;
pub mod queue;
pub mod reply;
pub mod state;
pub mod worker;

pub use {
    chunk::{Segmenter, segment},
    error::{Error, QueueError, Result},
    hub::{DeliveryHub, HubStatus},
    language::{LanguageDetector, ScriptRatioDetector},
    pacing::PacingModel,
    pipeline::{ConversationPipeline, ReplyReport},
    queue::{ChunkItem, DeliveryQueue, Dequeued, Outcome, Priority, QueueStatus},
    reply::{ReplyOutcome, generate_reply},
    state::{ConversationState, InboundOutcome, Phase, SessionWatermark},
    worker::DeliveryWorker,
};

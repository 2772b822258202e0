//! Metric names and label keys.
//!
//! All names carry the `ringle_` prefix. Durations are in seconds.

/// Outbound delivery queue and worker.
pub mod delivery {
    /// Chunks accepted into a queue
    pub const CHUNKS_ENQUEUED_TOTAL: &str = "ringle_delivery_chunks_enqueued_total";
    /// Chunks handed to a channel successfully
    pub const CHUNKS_DELIVERED_TOTAL: &str = "ringle_delivery_chunks_delivered_total";
    /// Chunks skipped at dequeue because their session was superseded
    pub const CHUNKS_STALE_TOTAL: &str = "ringle_delivery_chunks_stale_total";
    /// Chunks the channel failed to send
    pub const CHUNKS_FAILED_TOTAL: &str = "ringle_delivery_chunks_failed_total";
    /// Chunks removed or refused because a queue was full
    pub const CHUNKS_OVERFLOW_TOTAL: &str = "ringle_delivery_chunks_overflow_total";
    /// Pacing delay applied before a send
    pub const PACING_DELAY_SECONDS: &str = "ringle_delivery_pacing_delay_seconds";
    /// Pending chunks per channel, refreshed by the status reporter
    pub const QUEUE_DEPTH: &str = "ringle_delivery_queue_depth";
    /// Targets holding a queue and worker
    pub const ACTIVE_TARGETS: &str = "ringle_delivery_active_targets";
    /// Idle targets whose queue and worker were released
    pub const TARGETS_EVICTED_TOTAL: &str = "ringle_delivery_targets_evicted_total";
}

/// Conversation state machine and reply pipeline.
pub mod conversation {
    /// Inbound user messages processed
    pub const MESSAGES_RECEIVED_TOTAL: &str = "ringle_conversation_messages_received_total";
    /// Inbound messages that arrived while a reply was still in progress
    pub const INTERRUPTIONS_TOTAL: &str = "ringle_conversation_interruptions_total";
    /// Replies discarded because a newer message arrived during generation
    pub const REPLIES_DISCARDED_TOTAL: &str = "ringle_conversation_replies_discarded_total";
    /// Chunks produced per reply
    pub const SEGMENTS_PER_REPLY: &str = "ringle_conversation_segments_per_reply";
    /// Fallback message sent because generation failed
    pub const FALLBACKS_TOTAL: &str = "ringle_conversation_fallbacks_total";
}

/// Rolling conversation summaries.
pub mod summaries {
    pub const GENERATED_TOTAL: &str = "ringle_summaries_generated_total";
    pub const ERRORS_TOTAL: &str = "ringle_summaries_errors_total";
}

/// Language model calls.
pub mod llm {
    pub const COMPLETIONS_TOTAL: &str = "ringle_llm_completions_total";
    pub const COMPLETION_DURATION_SECONDS: &str = "ringle_llm_completion_duration_seconds";
    pub const COMPLETION_ERRORS_TOTAL: &str = "ringle_llm_completion_errors_total";
}

/// Messaging channels.
pub mod channels {
    pub const MESSAGES_RECEIVED_TOTAL: &str = "ringle_channel_messages_received_total";
    pub const MESSAGES_SENT_TOTAL: &str = "ringle_channel_messages_sent_total";
    pub const ERRORS_TOTAL: &str = "ringle_channel_errors_total";
    pub const POLL_ERRORS_TOTAL: &str = "ringle_channel_poll_errors_total";
    /// 1 for each channel with a registered outbound transport
    pub const REGISTERED: &str = "ringle_channels_registered";
}

pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const MODEL: &str = "model";
    pub const PRIORITY: &str = "priority";
    pub const POLICY: &str = "policy";
    pub const ERROR_TYPE: &str = "error_type";
    pub const LANGUAGE: &str = "language";
}

//! Per-conversation state machine: `Idle -> Waiting -> Responding -> Idle`.
//!
//! The machine owns session numbering only indirectly: ids come from the
//! delivery queue's watermark so that "current session" means the same thing
//! to the producer and the worker.

use {
    ringle_common::{Language, SessionId},
    tracing::{debug, info},
};

use crate::language::{LanguageDetector, ScriptRatioDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No outstanding request.
    Idle,
    /// Input received, reply not started.
    Waiting,
    /// A reply session is being generated or delivered.
    Responding,
}

/// Source of session ids. Implemented by the delivery queue.
pub trait SessionWatermark {
    /// Advance the watermark and return the new session id.
    fn start_new_session(&self) -> SessionId;

    fn current_session(&self) -> SessionId;
}

/// What happened when an inbound message was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundOutcome {
    /// The message arrived while a reply was being produced or delivered.
    pub interrupted: bool,
    pub language: Language,
    /// Inbound messages seen so far, including this one.
    pub message_count: u64,
    /// This message completes a summarization interval.
    pub summary_due: bool,
}

pub struct ConversationState {
    phase: Phase,
    language: Language,
    message_count: u64,
    summary_every: u64,
    session: Option<SessionId>,
    detector: Box<dyn LanguageDetector>,
}

impl std::fmt::Debug for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationState")
            .field("phase", &self.phase)
            .field("language", &self.language)
            .field("message_count", &self.message_count)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ConversationState {
    pub fn new(summary_every: u64, detector: Box<dyn LanguageDetector>) -> Self {
        Self {
            phase: Phase::Idle,
            language: Language::default(),
            message_count: 0,
            summary_every,
            session: None,
            detector,
        }
    }

    /// Start counting from an existing message total (e.g. restored from
    /// the transcript) so the summary cadence survives restarts.
    #[must_use]
    pub fn with_message_count(mut self, count: u64) -> Self {
        self.message_count = count;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Session of the reply currently in progress, if any was started.
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.session == Some(session)
    }

    /// Record new user input and move to `Waiting`.
    pub fn on_inbound(&mut self, text: &str) -> InboundOutcome {
        let interrupted = self.phase == Phase::Responding;
        self.phase = Phase::Waiting;
        self.language = self.detector.detect(text);
        self.message_count += 1;
        let summary_due = self.summary_every > 0 && self.message_count % self.summary_every == 0;
        debug!(
            language = self.language.code(),
            count = self.message_count,
            interrupted,
            "inbound recorded"
        );
        InboundOutcome {
            interrupted,
            language: self.language,
            message_count: self.message_count,
            summary_due,
        }
    }

    /// Move to `Responding` under a fresh session id taken from `watermark`.
    pub fn begin_response(&mut self, watermark: &impl SessionWatermark) -> SessionId {
        let session = watermark.start_new_session();
        self.session = Some(session);
        self.phase = Phase::Responding;
        info!(session, "response session started");
        session
    }

    /// Explicit end of `session`: back to `Idle` only if it is still the
    /// current session and nothing newer has arrived. Returns whether the
    /// transition happened.
    pub fn finish_response(&mut self, session: SessionId) -> bool {
        if self.phase == Phase::Responding && self.is_current(session) {
            self.phase = Phase::Idle;
            debug!(session, "response session finished");
            true
        } else {
            false
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(5, Box::new(ScriptRatioDetector::default()))
    }
}

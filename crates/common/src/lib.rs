//! Shared domain types used across the ringle crates: inbound messages, reply
//! targets, transcript turns, session ids and detected languages.

pub mod types;

pub use types::{
    ChatRole, HistoryEntry, InboundMessage, Language, ReplyTarget, SessionId, now_ms,
};

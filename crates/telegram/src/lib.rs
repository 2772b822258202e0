//! Telegram bot adapter.
//!
//! Inbound: a `getUpdates` long-polling loop that forwards private text
//! messages from allowlisted users. Outbound: `sendMessage` with rate-limit
//! retries, plus the "typing" chat action.

pub mod access;
pub mod bot;
pub mod error;
pub mod outbound;
pub mod text;

pub use {
    bot::{TelegramBot, start_polling},
    error::{Result, TelegramError},
    outbound::TelegramOutbound,
};

pub const CHANNEL_ID: &str = "telegram";

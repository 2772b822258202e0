//! Channel abstractions shared by the messaging transports.
//!
//! Each transport (iMessage, Telegram) implements [`ChannelOutbound`] for
//! sending, and either pushes inbound messages into an [`InboundSink`]
//! directly or exposes a [`MessageSource`] driven by [`spawn_poll_loop`].

pub mod error;
pub mod gating;
pub mod plugin;
pub mod poll;
pub mod registry;

pub use {
    error::{Error, Result},
    plugin::{ChannelOutbound, InboundSink, MessageSource, PolledMessage},
    poll::spawn_poll_loop,
    registry::ChannelRegistry,
};

use std::error::Error as StdError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by channel transports and the registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// No transport is registered under this channel id.
    #[error("unknown channel: {channel}")]
    UnknownChannel { channel: String },

    /// The transport is not configured or not reachable right now.
    #[error("channel unavailable: {message}")]
    Unavailable { message: String },

    /// Failure reported by the underlying platform (Bot API, AppleScript,
    /// chat.db, ...).
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_channel(channel: impl std::fmt::Display) -> Self {
        Self::UnknownChannel {
            channel: channel.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::UnknownChannel { .. } => "unknown_channel",
            Self::Unavailable { .. } => "unavailable",
            Self::External { .. } => "external",
        }
    }
}

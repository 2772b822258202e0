//! macOS Messages transport: inbound by polling `chat.db`, outbound through
//! AppleScript.

pub mod error;
pub mod sender;
pub mod source;

use std::path::PathBuf;

use {ringle_common::ReplyTarget, ringle_config::IMessageConfig};

pub use {
    error::{IMessageError, Result},
    sender::{AppleScriptSender, Service, escape_applescript, is_valid_recipient},
    source::ChatDbSource,
};

pub const CHANNEL_ID: &str = "imessage";

/// `~/Library/Messages/chat.db`.
pub fn default_db_path() -> Result<PathBuf> {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join("Library/Messages/chat.db"))
        .ok_or(IMessageError::NoHomeDir)
}

/// Configured database path, else the default location.
pub fn db_path(cfg: &IMessageConfig) -> Result<PathBuf> {
    match &cfg.db_path {
        Some(path) => Ok(path.clone()),
        None => default_db_path(),
    }
}

/// Where replies to the configured partner are delivered.
pub fn reply_target(cfg: &IMessageConfig) -> Option<ReplyTarget> {
    cfg.target
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| ReplyTarget::new(CHANNEL_ID, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_target_requires_partner() {
        let mut cfg = IMessageConfig::default();
        assert!(reply_target(&cfg).is_none());
        cfg.target = Some("  ".into());
        assert!(reply_target(&cfg).is_none());
        cfg.target = Some(" +15550001111 ".into());
        assert_eq!(
            reply_target(&cfg),
            Some(ReplyTarget::new(CHANNEL_ID, "+15550001111"))
        );
    }

    #[test]
    fn configured_db_path_wins() {
        let cfg = IMessageConfig {
            db_path: Some(PathBuf::from("/tmp/chat.db")),
            ..Default::default()
        };
        assert_eq!(db_path(&cfg).ok(), Some(PathBuf::from("/tmp/chat.db")));
    }
}

//! Which Telegram updates reach the conversation pipeline.

use {
    ringle_channels::gating,
    ringle_common::{InboundMessage, ReplyTarget},
    teloxide::types::Message,
};

use crate::CHANNEL_ID;

/// The fields of a Telegram message the agent looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingText<'a> {
    pub message_id: i32,
    pub chat_id: i64,
    pub private: bool,
    pub user_id: Option<u64>,
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub text: Option<&'a str>,
}

impl<'a> IncomingText<'a> {
    pub fn from_message(msg: &'a Message) -> Self {
        let from = msg.from.as_ref();
        Self {
            message_id: msg.id.0,
            chat_id: msg.chat.id.0,
            private: msg.chat.is_private(),
            user_id: from.map(|u| u.id.0),
            username: from.and_then(|u| u.username.as_deref()),
            first_name: from.map(|u| u.first_name.as_str()),
            text: msg.text(),
        }
    }

    /// Normalize into an inbound message if the sender may talk to the bot.
    pub fn into_inbound(self, allowlist: &[String]) -> Result<InboundMessage, AccessDenied> {
        check_access(&self, allowlist)?;
        let text = self
            .text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AccessDenied::NoText)?;
        let target = ReplyTarget::new(CHANNEL_ID, self.chat_id.to_string());
        let mut inbound = InboundMessage::new(self.message_id.to_string(), target, text);
        if let Some(name) = self.first_name.filter(|n| !n.trim().is_empty()) {
            inbound = inbound.with_sender_name(name.trim());
        }
        Ok(inbound)
    }
}

/// Only one-on-one chats with an allowlisted user are answered.
pub fn check_access(incoming: &IncomingText<'_>, allowlist: &[String]) -> Result<(), AccessDenied> {
    if !incoming.private {
        return Err(AccessDenied::NotPrivate);
    }
    let user_id = incoming.user_id.map(|id| id.to_string());
    let identities: Vec<&str> = user_id
        .as_deref()
        .into_iter()
        .chain(incoming.username)
        .collect();
    if identities.is_empty() && !allowlist.is_empty() {
        return Err(AccessDenied::NotOnAllowlist);
    }
    if gating::is_allowed(&identities, allowlist) {
        Ok(())
    } else {
        Err(AccessDenied::NotOnAllowlist)
    }
}

/// Reason an update was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    NotPrivate,
    NotOnAllowlist,
    NoText,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPrivate => write!(f, "not a private chat"),
            Self::NotOnAllowlist => write!(f, "user not on allowlist"),
            Self::NoText => write!(f, "message has no text"),
        }
    }
}

//! Outbound messages through Messages.app, driven by `osascript`.

use {
    async_trait::async_trait,
    ringle_channels::ChannelOutbound,
    tokio::process::Command,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{channels as ch_metrics, counter, labels};

use crate::error::{IMessageError, Result};

/// Messages services a recipient can be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    IMessage,
    Sms,
}

impl Service {
    /// `SMS` (any case) selects SMS; anything else is iMessage.
    pub fn from_hint(hint: &str) -> Self {
        if hint.trim().eq_ignore_ascii_case("sms") {
            Self::Sms
        } else {
            Self::IMessage
        }
    }

    fn applescript_type(self) -> &'static str {
        match self {
            Self::IMessage => "iMessage",
            Self::Sms => "SMS",
        }
    }
}

/// Escape a string for interpolation into an AppleScript string literal.
pub fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// A phone number in international form or an email address.
pub fn is_valid_recipient(to: &str) -> bool {
    let to = to.trim();
    if let Some(rest) = to.strip_prefix('+') {
        let digits = rest.chars().filter(char::is_ascii_digit).count();
        return (7..=15).contains(&digits)
            && rest
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
    }
    match to.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && local
                    .chars()
                    .all(|c| c.is_alphanumeric() || "._+-".contains(c))
                && domain.contains('.')
                && domain
                    .chars()
                    .all(|c| c.is_alphanumeric() || ".-".contains(c))
        },
        None => false,
    }
}

/// The script that sends `text` to `to` over `service`.
pub fn send_script(to: &str, text: &str, service: Service) -> String {
    format!(
        "tell application \"Messages\"\n\
         \tset targetService to 1st account whose service type = {service}\n\
         \tset targetBuddy to participant \"{to}\" of targetService\n\
         \tsend \"{text}\" to targetBuddy\n\
         end tell",
        service = service.applescript_type(),
        to = escape_applescript(to),
        text = escape_applescript(text),
    )
}

pub struct AppleScriptSender {
    default_service: Service,
}

impl AppleScriptSender {
    /// `default_service` is used when a chunk carries no service hint.
    pub fn new(default_service: &str) -> Self {
        Self {
            default_service: Service::from_hint(default_service),
        }
    }

    pub fn service_for(&self, hint: Option<&str>) -> Service {
        hint.map_or(self.default_service, Service::from_hint)
    }

    async fn run(&self, to: &str, text: &str, service: Service) -> Result<()> {
        if !cfg!(target_os = "macos") {
            return Err(IMessageError::UnsupportedPlatform);
        }
        if !is_valid_recipient(to) {
            return Err(IMessageError::InvalidTarget(to.to_string()));
        }

        let output = Command::new("osascript")
            .arg("-e")
            .arg(send_script(to, text, service))
            .output()
            .await?;
        if !output.status.success() {
            return Err(IMessageError::Script {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelOutbound for AppleScriptSender {
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        service_hint: Option<&str>,
    ) -> ringle_channels::Result<()> {
        let service = self.service_for(service_hint);
        match self.run(to, text, service).await {
            Ok(()) => {
                debug!(to, service = service.applescript_type(), chars = text.len(), "iMessage sent");
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::MESSAGES_SENT_TOTAL, labels::CHANNEL => crate::CHANNEL_ID).increment(1);
                Ok(())
            },
            Err(e) => {
                warn!(to, error = %e, "iMessage send failed");
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::ERRORS_TOTAL, labels::CHANNEL => crate::CHANNEL_ID).increment(1);
                Err(e.into())
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn escapes_quotes_backslashes_and_newlines() {
        assert_eq!(
            escape_applescript("say \"hi\"\\now\nthen"),
            "say \\\"hi\\\"\\\\now\\nthen"
        );
    }

    #[rstest]
    #[case("+15550001111", true)]
    #[case("+1 (555) 000-1111", true)]
    #[case("student@icloud.com", true)]
    #[case("15550001111", false)]
    #[case("+123", false)]
    #[case("", false)]
    #[case("\" & do shell script \"id\" & \"", false)]
    #[case("user@localhost", false)]
    fn recipient_validation(#[case] to: &str, #[case] valid: bool) {
        assert_eq!(is_valid_recipient(to), valid, "{to}");
    }

    #[rstest]
    #[case(Some("SMS"), Service::Sms)]
    #[case(Some("sms"), Service::Sms)]
    #[case(Some("iMessage"), Service::IMessage)]
    #[case(Some("RCS"), Service::IMessage)]
    #[case(None, Service::IMessage)]
    fn service_selection(#[case] hint: Option<&str>, #[case] expected: Service) {
        let sender = AppleScriptSender::new("iMessage");
        assert_eq!(sender.service_for(hint), expected);
    }

    #[test]
    fn default_service_applies_without_hint() {
        let sender = AppleScriptSender::new("SMS");
        assert_eq!(sender.service_for(None), Service::Sms);
    }

    #[test]
    fn script_embeds_escaped_text_and_service() {
        let script = send_script("+15550001111", "He said \"ok\"", Service::Sms);
        assert!(script.contains("service type = SMS"));
        assert!(script.contains("participant \"+15550001111\""));
        assert!(script.contains("send \"He said \\\"ok\\\"\" to targetBuddy"));
        assert!(script.starts_with("tell application \"Messages\""));
        assert!(script.ends_with("end tell"));
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn non_macos_reports_unavailable() {
        let sender = AppleScriptSender::new("iMessage");
        let err = sender
            .send_text("+15550001111", "hi", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }
}

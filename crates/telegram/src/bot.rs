use std::{sync::Arc, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {ringle_channels::InboundSink, ringle_config::TelegramConfig};

#[cfg(feature = "metrics")]
use ringle_metrics::{channels as ch_metrics, counter, labels};

use crate::{
    access::IncomingText,
    error::{Result, TelegramError},
    outbound::TelegramOutbound,
};

/// Long-polling timeout passed to `getUpdates`.
const POLL_TIMEOUT_SECS: u32 = 30;
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A connected bot: its outbound transport and the polling task.
pub struct TelegramBot {
    pub outbound: Arc<TelegramOutbound>,
    pub username: Option<String>,
    pub task: JoinHandle<()>,
}

/// Connect with the configured token and start the polling loop.
///
/// Private text messages from allowlisted users are forwarded to `sink`.
/// The loop ends when `cancel` fires or when another process starts polling
/// with the same token.
pub async fn start_polling(
    config: &TelegramConfig,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) -> Result<TelegramBot> {
    let token = config.token.as_ref().ok_or(TelegramError::MissingToken)?;

    // Client timeout must outlast the long-polling timeout.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 15))
        .build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    let username = me.username.clone();
    info!(username = ?username, "telegram bot connected (webhook cleared)");

    let outbound = Arc::new(TelegramOutbound::new(bot.clone()));
    let allowlist = config.allowlist.clone();
    let task = tokio::spawn(poll_loop(bot, allowlist, sink, cancel));

    Ok(TelegramBot {
        outbound,
        username,
        task,
    })
}

async fn poll_loop(
    bot: Bot,
    allowlist: Vec<String>,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) {
    info!("telegram polling started");
    let mut offset: i32 = 0;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .allowed_updates(vec![AllowedUpdate::Message])
                .send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    let UpdateKind::Message(msg) = update.kind else {
                        debug!("ignoring non-message update");
                        continue;
                    };
                    match IncomingText::from_message(&msg).into_inbound(&allowlist) {
                        Ok(inbound) => {
                            debug!(chat_id = msg.chat.id.0, "telegram message accepted");
                            #[cfg(feature = "metrics")]
                            counter!(
                                ch_metrics::MESSAGES_RECEIVED_TOTAL,
                                labels::CHANNEL => crate::CHANNEL_ID
                            )
                            .increment(1);
                            sink.dispatch(inbound).await;
                        },
                        Err(reason) => {
                            debug!(chat_id = msg.chat.id.0, %reason, "telegram message ignored");
                        },
                    }
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: another instance is polling with this token");
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                #[cfg(feature = "metrics")]
                counter!(ch_metrics::POLL_ERRORS_TOTAL, labels::CHANNEL => crate::CHANNEL_ID)
                    .increment(1);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(ERROR_BACKOFF) => {},
                }
            },
        }
    }
    info!("telegram polling stopped");
}

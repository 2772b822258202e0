//! Composition root for `ringle run`.

use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    secrecy::{ExposeSecret, Secret},
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    ringle_auto_reply::{ConversationPipeline, DeliveryHub},
    ringle_channels::{ChannelOutbound, ChannelRegistry, InboundSink, spawn_poll_loop},
    ringle_common::InboundMessage,
    ringle_config::{DeliveryConfig, IMessageConfig, RingleConfig},
    ringle_imessage::{AppleScriptSender, ChatDbSource},
    ringle_memory::{MemoryStore, SqliteMemoryStore},
    ringle_providers::{LlmProvider, OpenAiProvider},
};

/// Inbound messages buffered between the channels and the pipeline.
const INBOUND_BUFFER: usize = 64;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = ringle_config::discover_and_load(config_path);
    let provider = build_provider(&config)?;

    let db_path = ringle_config::memory_db_path(&config);
    let pool = ringle_memory::open_pool(&db_path)
        .await
        .with_context(|| format!("opening memory database {}", db_path.display()))?;
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(pool));

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel::<InboundMessage>(INBOUND_BUFFER);
    let sink: Arc<dyn InboundSink> = Arc::new(tx);

    let mut registry = ChannelRegistry::new();
    let mut inbound_tasks: Vec<JoinHandle<()>> = Vec::new();

    if config.channels.imessage.enabled {
        let (outbound, poller) =
            start_imessage(&config.channels.imessage, Arc::clone(&sink), cancel.clone()).await?;
        registry.register(ringle_imessage::CHANNEL_ID, outbound);
        inbound_tasks.push(poller);
    }
    if config.channels.telegram.enabled {
        let bot = ringle_telegram::start_polling(
            &config.channels.telegram,
            Arc::clone(&sink),
            cancel.clone(),
        )
        .await
        .context("starting telegram bot")?;
        registry.register(ringle_telegram::CHANNEL_ID, bot.outbound);
        inbound_tasks.push(bot.task);
    }
    drop(sink);

    if registry.is_empty() {
        bail!("no channel enabled; set channels.imessage or channels.telegram in the config");
    }
    info!(channels = ?registry.list(), "channels ready");

    let hub = Arc::new(DeliveryHub::new(
        registry,
        &config.pacing,
        config.delivery.clone(),
        cancel.child_token(),
    ));
    let pipeline = Arc::new(ConversationPipeline::new(&config, Arc::clone(&hub), provider, store));
    let housekeeping = spawn_housekeeping(&pipeline, &config.delivery, cancel.clone());
    let pipeline_task = tokio::spawn(Arc::clone(&pipeline).run(rx, cancel.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    for task in inbound_tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "inbound task ended abnormally");
        }
    }
    if let Err(e) = pipeline_task.await {
        warn!(error = %e, "pipeline task ended abnormally");
    }
    if let Some(task) = housekeeping
        && let Err(e) = task.await
    {
        warn!(error = %e, "housekeeping task ended abnormally");
    }
    hub.shutdown().await;
    info!("ringle stopped");
    Ok(())
}

/// Periodic queue status export and idle eviction, unless disabled.
fn spawn_housekeeping(
    pipeline: &Arc<ConversationPipeline>,
    delivery: &DeliveryConfig,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if delivery.status_interval_secs == 0 {
        info!("delivery status reporting disabled");
        return None;
    }
    let every = Duration::from_secs(delivery.status_interval_secs);
    let idle_after = (delivery.idle_evict_secs > 0)
        .then(|| Duration::from_secs(delivery.idle_evict_secs));
    info!(every = ?every, idle_after = ?idle_after, "delivery housekeeping started");
    Some(pipeline.spawn_housekeeping(every, idle_after, cancel))
}

fn build_provider(config: &RingleConfig) -> Result<Arc<dyn LlmProvider>> {
    let key = config
        .provider
        .api_key
        .as_ref()
        .map(|k| k.expose_secret().trim().to_string())
        .filter(|k| !k.is_empty())
        .context("no API key configured; set provider.api_key or OPENAI_API_KEY")?;
    Ok(Arc::new(OpenAiProvider::new(
        Secret::new(key),
        config.provider.model.clone(),
        config.provider.base_url.clone(),
    )))
}

async fn start_imessage(
    cfg: &IMessageConfig,
    sink: Arc<dyn InboundSink>,
    cancel: CancellationToken,
) -> Result<(Arc<dyn ChannelOutbound>, JoinHandle<()>)> {
    let target = ringle_imessage::reply_target(cfg)
        .context("channels.imessage.target is required when iMessage is enabled")?;
    let db_path = ringle_imessage::db_path(cfg)?;
    let source = ChatDbSource::open(&db_path, target.chat_id.clone())
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
    info!(target = %target, db = %db_path.display(), "imessage source ready");

    let poller = spawn_poll_loop(
        Arc::new(source),
        target,
        Duration::from_millis(cfg.poll_interval_ms.max(100)),
        sink,
        cancel,
    );
    Ok((Arc::new(AppleScriptSender::new(&cfg.service)), poller))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn provider_requires_non_blank_key() {
        let mut config = RingleConfig::default();
        assert!(build_provider(&config).is_err());

        config.provider.api_key = Some(Secret::new("   ".into()));
        assert!(build_provider(&config).is_err());

        config.provider.api_key = Some(Secret::new("sk-test".into()));
        assert!(build_provider(&config).is_ok());
    }

    #[tokio::test]
    async fn housekeeping_follows_delivery_config() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ringle_memory::open_pool(&dir.path().join("memory.db"))
            .await
            .unwrap();
        let mut config = RingleConfig::default();
        config.provider.api_key = Some(Secret::new("sk-test".into()));
        let hub = Arc::new(DeliveryHub::new(
            ChannelRegistry::new(),
            &config.pacing,
            config.delivery.clone(),
            CancellationToken::new(),
        ));
        let pipeline = Arc::new(ConversationPipeline::new(
            &config,
            hub,
            build_provider(&config).unwrap(),
            Arc::new(SqliteMemoryStore::new(pool)),
        ));

        let disabled = DeliveryConfig {
            status_interval_secs: 0,
            ..Default::default()
        };
        assert!(spawn_housekeeping(&pipeline, &disabled, CancellationToken::new()).is_none());

        let cancel = CancellationToken::new();
        let task = spawn_housekeeping(&pipeline, &config.delivery, cancel.clone()).unwrap();
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn imessage_requires_target() {
        let cfg = IMessageConfig {
            enabled: true,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel::<InboundMessage>(1);
        let err = start_imessage(&cfg, Arc::new(tx), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("target is required"));
    }

    #[tokio::test]
    async fn imessage_reports_missing_database() {
        let cfg = IMessageConfig {
            enabled: true,
            target: Some("+15550100".into()),
            db_path: Some("/nonexistent/ringle/chat.db".into()),
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel::<InboundMessage>(1);
        let result = start_imessage(&cfg, Arc::new(tx), CancellationToken::new()).await;
        assert!(result.is_err());
    }
}

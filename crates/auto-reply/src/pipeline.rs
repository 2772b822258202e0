//! Inbound message pipeline: transcript, state machine, reply generation,
//! segmentation and enqueueing.
//!
//! Acceptance (transcript write, state transition, new session) happens in
//! arrival order; generation and delivery of each reply run concurrently so
//! that a newer message can supersede a reply that is still being generated.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
    time::Duration,
};

use {
    ringle_common::{HistoryEntry, InboundMessage, Language, ReplyTarget, SessionId},
    ringle_config::{ConversationConfig, PersonaConfig, RingleConfig},
    ringle_memory::{MemoryStore, Summarizer, SummaryContext},
    ringle_providers::LlmProvider,
    tokio::{
        sync::mpsc,
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use ringle_metrics::{
    conversation as conv_metrics, counter, histogram, labels, summaries as summary_metrics,
};

use crate::{
    chunk::Segmenter,
    error::Result,
    hub::DeliveryHub,
    language::ScriptRatioDetector,
    prompt,
    queue::{DeliveryQueue, Priority},
    reply::generate_reply,
    state::{ConversationState, Phase},
};

/// Everything kept per reply target between messages.
struct Chat {
    state: Mutex<ConversationState>,
    summary: RwLock<SummaryContext>,
    last_active: Mutex<Instant>,
}

impl Chat {
    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn summary(&self) -> SummaryContext {
        self.summary
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_summary(&self, summary: SummaryContext) {
        *self
            .summary
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = summary;
    }

    fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyReport {
    pub session: SessionId,
    /// The message interrupted an earlier reply.
    pub interrupted: bool,
    /// Chunks enqueued for delivery.
    pub chunks: usize,
    pub fallback: bool,
    /// A newer message arrived during generation; nothing was enqueued.
    pub discarded: bool,
}

/// An accepted message waiting for its reply.
struct Turn {
    target: ReplyTarget,
    chat_key: String,
    queue: DeliveryQueue,
    chat: Arc<Chat>,
    session: SessionId,
    interrupted: bool,
    language: Language,
    service_hint: Option<String>,
    sender_name: Option<String>,
}

pub struct ConversationPipeline {
    hub: Arc<DeliveryHub>,
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn MemoryStore>,
    summarizer: Arc<Summarizer>,
    segmenter: Segmenter,
    persona: PersonaConfig,
    conversation: ConversationConfig,
    chats: Mutex<HashMap<ReplyTarget, Arc<Chat>>>,
}

impl ConversationPipeline {
    pub fn new(
        config: &RingleConfig,
        hub: Arc<DeliveryHub>,
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        let summarizer = Arc::new(Summarizer::new(
            Arc::clone(&provider),
            config.provider.summary_max_tokens,
            config.provider.summary_temperature,
        ));
        Self {
            hub,
            provider,
            store,
            summarizer,
            segmenter: Segmenter::new(&config.segmenter),
            persona: config.persona.clone(),
            conversation: config.conversation.clone(),
            chats: Mutex::new(HashMap::new()),
        }
    }

    /// Summary currently fed into `target`'s prompt, if the target was seen.
    pub fn summary_of(&self, target: &ReplyTarget) -> Option<SummaryContext> {
        self.chat(target).map(|chat| chat.summary())
    }

    /// Conversation phase of `target`, if the target was seen.
    pub fn phase_of(&self, target: &ReplyTarget) -> Option<Phase> {
        self.chat(target).map(|chat| chat.state().phase())
    }

    /// Targets with conversation state in memory.
    pub fn active_chats(&self) -> usize {
        self.chats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn chat(&self, target: &ReplyTarget) -> Option<Arc<Chat>> {
        self.chats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(target)
            .cloned()
    }

    /// The chat for `target`, marked active. On first contact its latest
    /// stored summary is loaded.
    async fn chat_for(&self, target: &ReplyTarget, chat_key: &str) -> Arc<Chat> {
        if let Some(chat) = self.chat(target) {
            chat.touch();
            return chat;
        }

        let summary = match self.store.latest_summary(chat_key).await {
            Ok(Some(row)) => {
                info!(
                    target = %target,
                    id = row.id,
                    date = %row.session_date,
                    "loaded previous conversation summary"
                );
                SummaryContext::from(row)
            },
            Ok(None) => SummaryContext::default(),
            Err(e) => {
                warn!(target = %target, error = %e, "failed to load previous summary");
                SummaryContext::default()
            },
        };

        let mut chats = self
            .chats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let chat = chats.entry(target.clone()).or_insert_with(|| {
            Arc::new(Chat {
                state: Mutex::new(ConversationState::new(
                    self.conversation.summary_every,
                    Box::new(ScriptRatioDetector::new(self.conversation.language_threshold)),
                )),
                summary: RwLock::new(summary),
                last_active: Mutex::new(Instant::now()),
            })
        });
        chat.touch();
        Arc::clone(chat)
    }

    /// Drop idle chats together with their delivery queue and worker. A chat
    /// is kept while a reply is pending or anything is left to deliver.
    pub fn evict_idle(&self, idle_after: Duration) -> usize {
        let mut chats = self
            .chats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = chats.len();
        chats.retain(|target, chat| {
            let idle = chat.state().phase() == Phase::Idle && chat.idle_for() >= idle_after;
            !(idle && self.hub.evict(target))
        });
        let evicted = before - chats.len();
        if evicted > 0 {
            info!(evicted, remaining = chats.len(), "released idle conversations");
        }
        evicted
    }

    /// Publish queue status every `every` and, when `idle_after` is set,
    /// release conversations idle for that long.
    pub fn spawn_housekeeping(
        self: &Arc<Self>,
        every: Duration,
        idle_after: Option<Duration>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {},
                }
                let status = this.hub.report();
                debug!(targets = status.len(), "delivery status published");
                if let Some(idle_after) = idle_after {
                    this.evict_idle(idle_after);
                }
            }
        })
    }

    /// Consume inbound messages until the channel closes or `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) {
        info!("conversation pipeline started");
        loop {
            let msg = tokio::select! {
                () = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            match self.accept(msg).await {
                Ok(turn) => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.respond(turn).await;
                    });
                },
                Err(e) => warn!(error = %e, "failed to accept inbound message"),
            }
        }
        info!("conversation pipeline stopped");
    }

    /// Accept and answer one message.
    pub async fn handle(&self, msg: InboundMessage) -> Result<ReplyReport> {
        let turn = self.accept(msg).await?;
        Ok(self.respond(turn).await)
    }

    async fn accept(&self, msg: InboundMessage) -> Result<Turn> {
        let chat_key = msg.target.key();
        // Marked active before the queue is taken so eviction cannot release
        // the queue this message is answered on.
        let chat = self.chat_for(&msg.target, &chat_key).await;
        let queue = self.hub.queue_for(&msg.target)?;

        if let Err(e) = self
            .store
            .append_message(&chat_key, &HistoryEntry::user(&msg.text))
            .await
        {
            warn!(target = %msg.target, error = %e, "failed to store user turn");
        }

        let (outcome, session) = {
            let mut st = chat.state();
            let outcome = st.on_inbound(&msg.text);
            if outcome.interrupted {
                let pending = queue.mark_stale_for_interruption();
                info!(target = %msg.target, pending, "reply interrupted by new message");
            }
            let session = st.begin_response(&queue);
            (outcome, session)
        };

        #[cfg(feature = "metrics")]
        {
            counter!(
                conv_metrics::MESSAGES_RECEIVED_TOTAL,
                labels::CHANNEL => msg.target.channel.clone(),
                labels::LANGUAGE => outcome.language.code()
            )
            .increment(1);
            if outcome.interrupted {
                counter!(
                    conv_metrics::INTERRUPTIONS_TOTAL,
                    labels::CHANNEL => msg.target.channel.clone()
                )
                .increment(1);
            }
        }

        if outcome.summary_due {
            self.spawn_summary(Arc::clone(&chat), chat_key.clone(), outcome.message_count);
        }

        Ok(Turn {
            target: msg.target,
            chat_key,
            queue,
            chat,
            session,
            interrupted: outcome.interrupted,
            language: outcome.language,
            service_hint: msg.service_hint,
            sender_name: msg.sender_name,
        })
    }

    async fn respond(&self, turn: Turn) -> ReplyReport {
        let user_name = self
            .persona
            .user_name
            .as_deref()
            .or(turn.sender_name.as_deref());
        let system_prompt = prompt::system_prompt(
            &self.persona.system_prompt,
            user_name,
            turn.language,
            &turn.chat.summary(),
        );
        let history = match self
            .store
            .recent_messages(&turn.chat_key, self.conversation.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(target = %turn.target, error = %e, "failed to load history");
                Vec::new()
            },
        };

        let reply = generate_reply(
            self.provider.as_ref(),
            &system_prompt,
            &history,
            Duration::from_secs(self.persona.reply_timeout_secs),
            &self.persona.fallback_message,
        )
        .await;

        let mut report = ReplyReport {
            session: turn.session,
            interrupted: turn.interrupted,
            chunks: 0,
            fallback: reply.fallback,
            discarded: false,
        };

        let current = turn.chat.state().is_current(turn.session);
        if !current {
            info!(target = %turn.target, session = turn.session, "discarding superseded reply");
            #[cfg(feature = "metrics")]
            counter!(
                conv_metrics::REPLIES_DISCARDED_TOTAL,
                labels::CHANNEL => turn.target.channel.clone()
            )
            .increment(1);
            report.discarded = true;
            return report;
        }

        let chunks = self.segmenter.segment(&reply.text);
        #[cfg(feature = "metrics")]
        histogram!(conv_metrics::SEGMENTS_PER_REPLY).record(chunks.len() as f64);
        for chunk in chunks {
            match turn.queue.enqueue_tagged(
                turn.session,
                Priority::High,
                turn.target.clone(),
                chunk,
                turn.service_hint.clone(),
            ) {
                Ok(_) => report.chunks += 1,
                Err(e) => warn!(
                    target = %turn.target,
                    session = turn.session,
                    error = %e,
                    "chunk not enqueued"
                ),
            }
        }
        debug!(
            target = %turn.target,
            session = turn.session,
            chunks = report.chunks,
            "reply enqueued"
        );

        if !reply.fallback
            && let Err(e) = self
                .store
                .append_message(&turn.chat_key, &HistoryEntry::assistant(&reply.text))
                .await
        {
            warn!(target = %turn.target, error = %e, "failed to store assistant turn");
        }

        let (queue, chat, session) = (turn.queue, turn.chat, turn.session);
        tokio::spawn(async move {
            queue.settled(session).await;
            let idle = chat.state().finish_response(session);
            chat.touch();
            debug!(session, idle, "response session settled");
        });

        report
    }

    fn spawn_summary(&self, chat: Arc<Chat>, chat_key: String, message_count: u64) {
        let store = Arc::clone(&self.store);
        let summarizer = Arc::clone(&self.summarizer);
        let limit = self.conversation.summary_history_limit;

        tokio::spawn(async move {
            let history = match store.recent_messages(&chat_key, limit).await {
                Ok(history) => history,
                Err(e) => {
                    warn!(chat = %chat_key, error = %e, "failed to load history for summary");
                    return;
                },
            };
            let summary = summarizer.summarize(&history).await;
            if summary.is_empty() {
                warn!(chat = %chat_key, message_count, "summary generation produced nothing");
                #[cfg(feature = "metrics")]
                counter!(summary_metrics::ERRORS_TOTAL).increment(1);
                return;
            }
            let key_points = summarizer.key_points(&history).await;
            match store
                .save_summary(&chat_key, &summary, &key_points, message_count)
                .await
            {
                Ok(id) => {
                    info!(
                        id,
                        chat = %chat_key,
                        message_count,
                        points = key_points.len(),
                        "conversation summary saved"
                    );
                    #[cfg(feature = "metrics")]
                    counter!(summary_metrics::GENERATED_TOTAL).increment(1);
                    chat.set_summary(SummaryContext::new(summary, key_points));
                },
                Err(e) => {
                    warn!(chat = %chat_key, error = %e, "failed to save summary");
                    #[cfg(feature = "metrics")]
                    counter!(summary_metrics::ERRORS_TOTAL).increment(1);
                },
            }
        });
    }
}

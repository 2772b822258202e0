use std::{collections::HashMap, sync::Arc};

use crate::{Error, Result, plugin::ChannelOutbound};

#[cfg(feature = "metrics")]
use ringle_metrics::{channels as ch_metrics, gauge, labels};

/// Outbound transports keyed by channel id.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    outbounds: HashMap<String, Arc<dyn ChannelOutbound>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: impl Into<String>, outbound: Arc<dyn ChannelOutbound>) {
        let channel = channel.into();
        tracing::debug!(channel = %channel, "registered channel outbound");
        #[cfg(feature = "metrics")]
        gauge!(ch_metrics::REGISTERED, labels::CHANNEL => channel.clone()).set(1.0);
        self.outbounds.insert(channel, outbound);
    }

    pub fn get(&self, channel: &str) -> Option<Arc<dyn ChannelOutbound>> {
        self.outbounds.get(channel).cloned()
    }

    /// Like [`get`](Self::get) but an unknown id is an error.
    pub fn resolve(&self, channel: &str) -> Result<Arc<dyn ChannelOutbound>> {
        self.get(channel)
            .ok_or_else(|| Error::unknown_channel(channel))
    }

    /// Registered channel ids, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.outbounds.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.outbounds.is_empty()
    }
}

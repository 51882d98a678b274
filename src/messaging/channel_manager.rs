//! Channel Manager
//!
//! Owns the broker connection and one reusable, confirm-mode publish
//! channel. The channel is created lazily and recreated if the broker closed
//! it; creation is serialized so concurrent publishers never race to open
//! two channels or observe one before confirms are enabled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::ports::{BrokerChannel, BrokerConnection};
use crate::error::Result;

/// Lazily creates and caches the publish channel.
pub struct ChannelManager {
    connection: Arc<dyn BrokerConnection>,
    channel: Mutex<Option<Arc<dyn BrokerChannel>>>,
    channels_opened: AtomicU64,
}

impl ChannelManager {
    pub fn new(connection: Arc<dyn BrokerConnection>) -> Self {
        Self {
            connection,
            channel: Mutex::new(None),
            channels_opened: AtomicU64::new(0),
        }
    }

    /// Return the cached channel, creating a fresh confirm-mode channel if
    /// none exists yet or the cached one was closed.
    #[instrument(skip(self))]
    pub async fn get_channel(&self) -> Result<Arc<dyn BrokerChannel>> {
        let mut guard = self.channel.lock().await;

        if let Some(channel) = guard.as_ref() {
            if channel.is_open() {
                return Ok(Arc::clone(channel));
            }
            warn!("Cached publish channel was closed, reopening");
        }

        let channel = self.connection.create_channel().await?;
        channel.enable_confirms().await?;

        let opened = self.channels_opened.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(channels_opened = opened, "Opened publish channel in confirm mode");

        *guard = Some(Arc::clone(&channel));
        Ok(channel)
    }

    /// Number of channels opened over the manager's lifetime.
    pub fn channels_opened(&self) -> u64 {
        self.channels_opened.load(Ordering::Relaxed)
    }

    /// Close the cached channel and the connection.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        if let Some(channel) = self.channel.lock().await.take() {
            if channel.is_open() {
                channel.close().await?;
            }
        }
        self.connection.close().await?;
        info!("Broker connection closed");
        Ok(())
    }
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("channels_opened", &self.channels_opened())
            .finish()
    }
}

//! Encoder Result Consumer
//!
//! Background worker bound to the encoder-result queue. Messages are handled
//! strictly one at a time: a message is decoded, applied through
//! `UpdateMediaStatus`, committed and acknowledged before the next one is
//! read. Cancellation is only observed between messages.
//!
//! Every message is acknowledged once handled, whatever the outcome.
//! Malformed or stale results are logged and dropped so they cannot block
//! the queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::encoder_result::EncoderResult;
use crate::application::UpdateMediaStatus;
use crate::domain::ports::{InboundMessage, MessageSubscription};
use crate::error::Result;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Queue the encoder publishes results to
    pub queue: String,

    /// Routing key binding the queue to the exchange
    pub routing_key: String,

    /// Consumer tag reported to the broker
    pub consumer_tag: String,

    /// Unacknowledged deliveries the broker may push ahead
    pub prefetch: u16,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue: "videos.converted".to_string(),
            routing_key: "videos.converted".to_string(),
            consumer_tag: "catalog-encoder".to_string(),
            prefetch: 1,
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Status update applied and committed
    Applied,
    /// Expected failure (malformed, unknown video, invalid status); dropped
    Discarded,
    /// Unexpected failure while applying; dropped
    Failed,
}

/// Counters for a finished consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub applied: u64,
    pub discarded: u64,
    pub failed: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Applied => self.applied += 1,
            MessageOutcome::Discarded => self.discarded += 1,
            MessageOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.applied + self.discarded + self.failed
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// Applies encoder results to videos.
pub struct EncoderResultConsumer {
    update_media_status: Arc<UpdateMediaStatus>,
}

impl EncoderResultConsumer {
    pub fn new(update_media_status: Arc<UpdateMediaStatus>) -> Self {
        Self {
            update_media_status,
        }
    }

    /// Run until cancelled or until the subscription ends.
    #[instrument(skip_all)]
    pub async fn run<S>(&self, mut subscription: S, cancel: CancellationToken) -> ConsumerStats
    where
        S: MessageSubscription,
    {
        info!("Starting encoder result consumer");
        let mut stats = ConsumerStats::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Encoder result consumer shutting down");
                    break;
                }
                next = subscription.next_message() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    error!("Error receiving delivery: {}", e);
                    continue;
                }
                None => {
                    warn!("Subscription closed by broker");
                    break;
                }
            };

            // Not raced against cancellation: a started message always finishes.
            let outcome = self.handle_message(&message).await;
            stats.record(outcome);

            if let Err(e) = message.ack().await {
                error!("Failed to acknowledge message: {}", e);
            }
        }

        info!(
            applied = stats.applied,
            discarded = stats.discarded,
            failed = stats.failed,
            "Encoder result consumer stopped"
        );
        stats
    }

    /// Decode and apply a single message. Never fails; errors are logged.
    #[instrument(skip_all, fields(bytes = message.payload.len()))]
    pub async fn handle_message(&self, message: &InboundMessage) -> MessageOutcome {
        match self.apply(&message.payload).await {
            Ok(()) => MessageOutcome::Applied,
            Err(e) if e.is_message_terminal() => {
                warn!("Discarding encoder result: {}", e);
                MessageOutcome::Discarded
            }
            Err(e) => {
                error!("Failed to apply encoder result: {}", e);
                MessageOutcome::Failed
            }
        }
    }

    async fn apply(&self, payload: &[u8]) -> Result<()> {
        let result = EncoderResult::from_slice(payload)?;
        let input = result.into_status_update()?;
        debug!(video_id = %input.video_id, status = %input.status, "Applying encoder result");
        self.update_media_status.execute(input).await
    }
}

impl std::fmt::Debug for EncoderResultConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderResultConsumer").finish_non_exhaustive()
    }
}

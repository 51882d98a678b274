//! Domain Ports (Port/Adapter Pattern)
//!
//! Trait abstractions for everything the pipeline talks to: persistence, blob
//! storage, event handlers and the message broker. Adapters in
//! [`crate::adapters`] implement them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                           │
//! │  VideoStore │ StorageService │ EventHandler │ MessageProducer│
//! │  BrokerConnection │ BrokerChannel │ MessageSubscription      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                      │
//! │  InMemoryVideoStore │ LocalFileStorage │ Amqp* │ InMemory*  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::events::DomainEvent;
use super::video::{Video, VideoId};
use crate::error::Result;

// =============================================================================
// Persistence Port
// =============================================================================

/// A single staged write.
#[derive(Debug, Clone)]
pub enum Change {
    Upsert(Video),
    Delete(VideoId),
}

/// Port for video persistence.
///
/// `persist` applies a whole batch as one durable operation: either every
/// change is visible afterwards or none is.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Load a video by id.
    async fn get(&self, id: &VideoId) -> Result<Option<Video>>;

    /// Durably apply a batch of changes.
    async fn persist(&self, changes: &[Change]) -> Result<()>;
}

// =============================================================================
// Blob Storage Port
// =============================================================================

/// Port for blob storage. Opaque to the pipeline apart from the returned path.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store `content` under `name`, returning the stored path.
    async fn upload(&self, name: &str, content: Bytes, content_type: &str) -> Result<String>;

    /// Remove a previously uploaded blob.
    async fn delete(&self, path: &str) -> Result<()>;
}

// =============================================================================
// Event Handling Ports
// =============================================================================

/// Handler invoked by the dispatcher for events of the types it is
/// registered against.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one event. Errors propagate to the committing caller.
    async fn handle(&self, event: &DomainEvent) -> Result<()>;
}

/// Port for sending events to the message broker.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish an event and wait for the broker to confirm it.
    async fn send(&self, event: &DomainEvent) -> Result<()>;
}

// =============================================================================
// Broker Ports
// =============================================================================

/// Broker answer to a publish on a confirm-mode channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishConfirmation {
    Ack,
    Nack,
    /// The channel was not in confirm mode.
    NotRequested,
}

/// A logical publish/subscribe session over one broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// False once the broker (or we) closed the channel.
    fn is_open(&self) -> bool;

    /// Put the channel into publisher-confirm mode.
    async fn enable_confirms(&self) -> Result<()>;

    /// Publish `payload` and wait for the broker's confirmation.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<PublishConfirmation>;

    async fn close(&self) -> Result<()>;
}

/// The process-wide broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>>;

    async fn close(&self) -> Result<()>;
}

/// Acknowledges one delivered message.
#[async_trait]
pub trait MessageAcker: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// A message delivered from a queue.
pub struct InboundMessage {
    pub payload: Vec<u8>,
    acker: Box<dyn MessageAcker>,
}

impl InboundMessage {
    pub fn new(payload: Vec<u8>, acker: Box<dyn MessageAcker>) -> Self {
        Self { payload, acker }
    }

    /// Acknowledge the message so the broker never redelivers it.
    pub async fn ack(&self) -> Result<()> {
        self.acker.ack().await
    }
}

impl std::fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundMessage")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// A subscription to one queue.
#[async_trait]
pub trait MessageSubscription: Send {
    /// Wait for the next delivery. `None` means the subscription ended.
    async fn next_message(&mut self) -> Option<Result<InboundMessage>>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(
        _: &dyn VideoStore,
        _: &dyn StorageService,
        _: &dyn EventHandler,
        _: &dyn MessageProducer,
        _: &dyn BrokerConnection,
        _: &dyn BrokerChannel,
        _: &dyn MessageSubscription,
    ) {
    }

    struct NoopAcker;

    #[async_trait]
    impl MessageAcker for NoopAcker {
        async fn ack(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_inbound_message_debug_hides_payload() {
        let message = InboundMessage::new(b"{\"secret\":1}".to_vec(), Box::new(NoopAcker));

        assert_eq!(format!("{:?}", message), "InboundMessage { payload_len: 12 }");
        message.ack().await.unwrap();
    }
}

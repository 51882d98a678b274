//! Message Producer
//!
//! Serializes domain events, resolves their routing key and publishes them
//! to a fixed exchange, blocking until the broker confirms each message.
//! Confirms are awaited one message at a time; nothing is batched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::channel_manager::ChannelManager;
use crate::domain::events::{DomainEvent, EventType};
use crate::domain::ports::{MessageProducer, PublishConfirmation};
use crate::error::{Error, Result};

/// Routing key of the upload event.
pub const VIDEO_CREATED_ROUTING_KEY: &str = "video.created";

static DEFAULT_ROUTES: Lazy<HashMap<EventType, String>> = Lazy::new(|| {
    HashMap::from([(
        EventType::VideoUploaded,
        VIDEO_CREATED_ROUTING_KEY.to_string(),
    )])
});

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Exchange every event is published to
    pub exchange: String,

    /// How long to wait for a publisher confirm
    #[serde(with = "duration_secs")]
    pub confirm_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            exchange: "amq.direct".to_string(),
            confirm_timeout: Duration::from_secs(30),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// =============================================================================
// Routing Table
// =============================================================================

/// Event type -> routing key. Read-only once built.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<EventType, String>,
}

impl RoutingTable {
    /// An empty table; every lookup fails.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    pub fn with_route(mut self, event_type: EventType, routing_key: impl Into<String>) -> Self {
        self.routes.insert(event_type, routing_key.into());
        self
    }

    /// Resolve the routing key for an event type.
    pub fn resolve(&self, event_type: EventType) -> Result<&str> {
        self.routes
            .get(&event_type)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownEventType(event_type.to_string()))
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            routes: DEFAULT_ROUTES.clone(),
        }
    }
}

// =============================================================================
// Broker Producer
// =============================================================================

/// Publishes events through the shared confirm-mode channel.
#[derive(Debug)]
pub struct BrokerProducer {
    config: ProducerConfig,
    routes: RoutingTable,
    channels: Arc<ChannelManager>,
}

impl BrokerProducer {
    pub fn new(
        config: ProducerConfig,
        routes: RoutingTable,
        channels: Arc<ChannelManager>,
    ) -> Self {
        Self {
            config,
            routes,
            channels,
        }
    }
}

#[async_trait]
impl MessageProducer for BrokerProducer {
    #[instrument(skip(self, event), fields(event_type = %event.event_type(), resource_id = %event.resource_id()))]
    async fn send(&self, event: &DomainEvent) -> Result<()> {
        let routing_key = self.routes.resolve(event.event_type())?;
        let payload = event.wire_payload()?;

        let channel = self.channels.get_channel().await?;

        let confirmation = timeout(
            self.config.confirm_timeout,
            channel.publish(&self.config.exchange, routing_key, &payload),
        )
        .await
        .map_err(|_| {
            Error::DeliveryFailed(format!(
                "no publisher confirm for '{}' within {:?}",
                routing_key, self.config.confirm_timeout
            ))
        })??;

        match confirmation {
            PublishConfirmation::Ack => {
                debug!(
                    exchange = %self.config.exchange,
                    routing_key = %routing_key,
                    bytes = payload.len(),
                    "Publish confirmed"
                );
                Ok(())
            }
            PublishConfirmation::Nack => {
                warn!(routing_key = %routing_key, "Broker rejected publish");
                Err(Error::DeliveryFailed(format!(
                    "broker nacked message for '{}'",
                    routing_key
                )))
            }
            PublishConfirmation::NotRequested => Err(Error::DeliveryFailed(format!(
                "channel not in confirm mode while publishing '{}'",
                routing_key
            ))),
        }
    }
}

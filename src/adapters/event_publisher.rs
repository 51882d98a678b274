//! Event Handler Adapters
//!
//! Generic `EventHandler` implementations that can be registered next to the
//! encoder dispatch handler.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::events::{DomainEvent, EventType};
use crate::domain::ports::EventHandler;
use crate::error::Result;

/// Logging-based event handler.
///
/// Writes every dispatched domain event to the tracing system.
/// Useful for development, debugging, and audit trails.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventHandler {
    /// Whether to log events at info level (true) or debug level (false)
    info_level: bool,
}

impl LoggingEventHandler {
    /// Create a handler that logs at debug level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler that logs at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        let event_type = event.event_type();
        let json = serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event));

        if self.info_level {
            info!(event_type = %event_type, event = %json, "Domain event");
        } else {
            debug!(event_type = %event_type, event = %json, "Domain event");
        }

        Ok(())
    }
}

/// In-memory event collector.
///
/// Records dispatched events for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: parking_lot::RwLock<Vec<DomainEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type.
    pub fn events_of_type(&self, event_type: EventType) -> Vec<DomainEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventHandler for InMemoryEventCollector {
    fn name(&self) -> &'static str {
        "in_memory_collector"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        self.events.write().push(event.clone());
        Ok(())
    }
}

//! Event Dispatcher
//!
//! Routes a published domain event to the handlers registered for its type.
//! The registration table is built once at startup and is read-only after
//! that; resolution is a map lookup keyed by [`EventType`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::events::{DomainEvent, EventType};
use crate::domain::ports::EventHandler;
use crate::error::Result;

/// Event type -> ordered handler list.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event type. Handlers run in registration order.
    pub fn register(mut self, event_type: EventType, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.entry(event_type).or_default().push(handler);
        self
    }

    /// Handlers for an event type, empty if none are registered.
    pub fn handlers_for(&self, event_type: EventType) -> &[Arc<dyn EventHandler>] {
        self.handlers
            .get(&event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (event_type, handlers) in &self.handlers {
            let names: Vec<_> = handlers.iter().map(|h| h.name()).collect();
            map.entry(event_type, &names);
        }
        map.finish()
    }
}

/// Publishes events to their registered handlers.
#[derive(Debug, Clone, Default)]
pub struct EventDispatcher {
    registry: HandlerRegistry,
}

impl EventDispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Invoke every handler registered for the event's type, in order.
    ///
    /// Stops at the first handler error and returns it. With no handlers
    /// registered this is a no-op.
    #[instrument(skip(self, event), fields(event_type = %event.event_type()))]
    pub async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let handlers = self.registry.handlers_for(event.event_type());
        if handlers.is_empty() {
            debug!("No handlers registered, dropping event");
            return Ok(());
        }

        for handler in handlers {
            debug!(handler = handler.name(), "Dispatching event");
            handler.handle(event).await?;
        }

        Ok(())
    }
}

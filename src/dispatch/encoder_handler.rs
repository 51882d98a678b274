//! Encoder dispatch handler
//!
//! Forwards upload events to the message producer so the external encoder
//! picks them up.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::events::DomainEvent;
use crate::domain::ports::{EventHandler, MessageProducer};
use crate::error::Result;

/// Sends `VideoUploaded` events to the encoder through the broker.
pub struct DispatchToEncoder {
    producer: Arc<dyn MessageProducer>,
}

impl DispatchToEncoder {
    pub fn new(producer: Arc<dyn MessageProducer>) -> Self {
        Self { producer }
    }
}

impl std::fmt::Debug for DispatchToEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchToEncoder").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventHandler for DispatchToEncoder {
    fn name(&self) -> &'static str {
        "dispatch_to_encoder"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::VideoUploaded(uploaded) => {
                self.producer.send(event).await?;
                info!(
                    video_id = %uploaded.resource_id,
                    file_path = %uploaded.file_path,
                    "Video sent to encoder"
                );
            }
        }
        Ok(())
    }
}

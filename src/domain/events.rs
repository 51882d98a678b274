//! Domain Events
//!
//! Events are raised by aggregate operations and buffered on the aggregate
//! until the owning unit of work commits. They form a closed set: routing and
//! handler registration are keyed by [`EventType`], never by reflection.
//!
//! # Example
//!
//! ```ignore
//! video.attach_media(MediaType::Video, name, path);
//! uow.update(video);
//! uow.commit().await?; // publishes DomainEvent::VideoUploaded
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::video::VideoId;
use crate::error::Result;

/// Discriminant of a [`DomainEvent`], used as the key of routing and
/// handler registration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    VideoUploaded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::VideoUploaded => "VideoUploaded",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A video's primary media file was uploaded and must be encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoUploadedEvent {
    pub resource_id: VideoId,
    pub file_path: String,
    pub occurred_at: DateTime<Utc>,
}

impl VideoUploadedEvent {
    pub fn new(resource_id: VideoId, file_path: impl Into<String>) -> Self {
        Self {
            resource_id,
            file_path: file_path.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Domain event representing a significant occurrence in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    VideoUploaded(VideoUploadedEvent),
}

impl DomainEvent {
    /// Get the event type.
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::VideoUploaded(_) => EventType::VideoUploaded,
        }
    }

    /// Get the timestamp of the event.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::VideoUploaded(e) => e.occurred_at,
        }
    }

    /// Get the id of the aggregate that raised the event.
    pub fn resource_id(&self) -> VideoId {
        match self {
            DomainEvent::VideoUploaded(e) => e.resource_id,
        }
    }

    /// Serialize the event payload for the broker.
    ///
    /// Only the inner payload goes on the wire, with snake_case field names
    /// and no type tag; the routing key identifies the event type.
    pub fn wire_payload(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            DomainEvent::VideoUploaded(e) => serde_json::to_vec(e)?,
        };
        Ok(bytes)
    }
}

// =============================================================================
// Tests
// =============================================================================

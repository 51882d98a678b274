//! Error types for the catalog encoding pipeline

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the encoding pipeline
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    // =========================================================================
    // Domain / Use Case Errors
    // =========================================================================
    /// Input or aggregate validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Status transition attempted on a video without media
    #[error("Video {video_id} has no media to transition")]
    MediaNotPresent { video_id: String },

    // =========================================================================
    // Messaging Errors
    // =========================================================================
    /// No routing key registered for the event type
    #[error("No routing key registered for event type: {0}")]
    UnknownEventType(String),

    /// Broker did not positively confirm a publish
    #[error("Message delivery failed: {0}")]
    DeliveryFailed(String),

    /// Inbound message could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// AMQP client error
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Persistence backend failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Blob storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a missing video.
    pub fn video_not_found(id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: "Video",
            id: id.to_string(),
        }
    }

    /// Whether the consumer may log this error and drop the message.
    ///
    /// These are expected outcomes for stale or malformed encoder results.
    /// Anything else points at an infrastructure fault.
    pub fn is_message_terminal(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::NotFound { .. }
                | Error::MediaNotPresent { .. }
                | Error::MalformedMessage(_)
        )
    }
}

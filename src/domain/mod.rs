//! Domain Layer
//!
//! Core domain logic following Domain-Driven Design principles.
//!
//! - **Video** (`video.rs`) - The `Video` aggregate and its media state machine
//! - **Events** (`events.rs`) - Domain events buffered on the aggregate
//! - **Ports** (`ports.rs`) - Trait abstractions for external dependencies

pub mod events;
pub mod ports;
pub mod video;

pub use events::{DomainEvent, EventType, VideoUploadedEvent};
pub use ports::{
    BrokerChannel, BrokerConnection, Change, EventHandler, InboundMessage, MessageAcker,
    MessageProducer, MessageSubscription, PublishConfirmation, StorageService, VideoStore,
};
pub use video::{
    ImageMedia, Media, MediaStatus, MediaType, Rating, Video, VideoId, VideoMetadata,
};

//! Catalog Encoder - Media Encoding Pipeline
//!
//! The asynchronous half of the media catalog: domain events raised by the
//! `Video` aggregate, their publication after a successful commit, reliable
//! delivery of upload events to the encoder through an AMQP broker, and the
//! consumption of encoder results that drive the media status state machine.
//!
//! # Architecture
//!
//! ```text
//! Video ─▶ UnitOfWork::commit ─▶ EventDispatcher ─▶ DispatchToEncoder ─▶ BrokerProducer
//!                                                                            │
//!                                                                  broker / external encoder
//!                                                                            │
//! Video ◀─ UpdateMediaStatus ◀──────────── EncoderResultConsumer ◀──────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`application`] - Use cases and the unit of work
//! - [`config`] - Application configuration
//! - [`dispatch`] - Event dispatcher and handlers
//! - [`domain`] - Video aggregate, domain events and ports (DDD)
//! - [`error`] - Error types
//! - [`messaging`] - Producer, channel manager and result consumer

pub mod adapters;
pub mod application;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod messaging;

// Re-export commonly used types
pub use application::{UnitOfWork, UpdateMediaStatus, UpdateMediaStatusInput};
pub use config::AppConfig;
pub use dispatch::{DispatchToEncoder, EventDispatcher, HandlerRegistry};
pub use domain::{DomainEvent, Media, MediaStatus, Video, VideoId};
pub use error::{Error, Result};
pub use messaging::{BrokerProducer, ChannelManager, EncoderResultConsumer, RoutingTable};

//! Infrastructure Adapters
//!
//! Adapter implementations for the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                             │
//! │  VideoStore │ StorageService │ EventHandler │ Broker* ports     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                      │
//! │  InMemoryVideoStore │ LocalFileStorage │ InMemoryStorage        │
//! │  AmqpConnection │ InMemoryBroker │ LoggingEventHandler          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use catalog_encoder::adapters::AmqpConnection;
//! use catalog_encoder::messaging::ChannelManager;
//!
//! let connection = Arc::new(AmqpConnection::connect("amqp://localhost:5672").await?);
//! let channels = ChannelManager::new(connection.clone());
//! ```

mod amqp;
mod event_publisher;
mod in_memory_broker;
mod in_memory_store;
mod storage;

pub use amqp::{AmqpChannel, AmqpConnection, AmqpSubscription};
pub use event_publisher::{InMemoryEventCollector, LoggingEventHandler};
pub use in_memory_broker::{ConfirmBehavior, InMemoryBroker, InMemorySubscription, PublishedMessage};
pub use in_memory_store::InMemoryVideoStore;
pub use storage::{InMemoryStorage, LocalFileStorage, StorageConfig, StoredBlob};

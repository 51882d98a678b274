//! Messaging
//!
//! Broker-facing half of the encoding pipeline.
//!
//! ```text
//! commit ─▶ DispatchToEncoder ─▶ BrokerProducer ─▶ ChannelManager ─▶ broker
//!                                                                     │
//!                                                              external encoder
//!                                                                     │
//! UpdateMediaStatus ◀─ EncoderResultConsumer ◀────────────────────────┘
//! ```

mod channel_manager;
mod consumer;
mod encoder_result;
mod producer;

pub use channel_manager::ChannelManager;
pub use consumer::{ConsumerConfig, ConsumerStats, EncoderResultConsumer, MessageOutcome};
pub use encoder_result::{EncodedVideo, EncoderResult, FailedVideo};
pub use producer::{BrokerProducer, ProducerConfig, RoutingTable, VIDEO_CREATED_ROUTING_KEY};

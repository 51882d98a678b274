//! Catalog Encoder
//!
//! Runs the encoding side of the media catalog: publishes upload events to
//! the encoder and applies the encoder's results to the catalog.
//!
//! Files passed with `--upload` are registered as new videos at startup and
//! sent to encode through the same store the result consumer updates.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Catalog Encoder                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Unit of     │───▶│  Dispatcher  │───▶│   Producer   │──▶ MQ │
//! │  │  Work        │    │              │    │  (confirms)  │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │         ▲                                                       │
//! │  ┌──────┴───────┐    ┌──────────────┐                           │
//! │  │ UpdateMedia  │◀───│   Result     │◀────────────────────── MQ │
//! │  │ Status       │    │   Consumer   │                           │
//! │  └──────────────┘    └──────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{Datelike, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use catalog_encoder::adapters::{
    AmqpConnection, InMemoryVideoStore, LocalFileStorage, LoggingEventHandler,
};
use catalog_encoder::domain::events::EventType;
use catalog_encoder::application::{
    CreateVideo, CreateVideoInput, UploadVideoMedia, UploadVideoMediaInput,
};
use catalog_encoder::domain::ports::{MessageProducer, StorageService};
use catalog_encoder::domain::{MediaType, Rating, VideoId, VideoMetadata};
use catalog_encoder::error::{Error, Result};
use catalog_encoder::{
    AppConfig, BrokerProducer, ChannelManager, DispatchToEncoder, EncoderResultConsumer,
    EventDispatcher, HandlerRegistry, RoutingTable, UpdateMediaStatus,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Catalog Encoder - media encoding event pipeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "CATALOG_ENCODER_CONFIG")]
    config: Option<PathBuf>,

    /// AMQP broker URI
    #[arg(long, env = "AMQP_URL")]
    amqp_url: Option<String>,

    /// Exchange events are published to
    #[arg(long, env = "AMQP_EXCHANGE")]
    exchange: Option<String>,

    /// Queue the encoder publishes results to
    #[arg(long, env = "ENCODER_RESULT_QUEUE")]
    result_queue: Option<String>,

    /// Unacknowledged deliveries the broker may push ahead
    #[arg(long, env = "CONSUMER_PREFETCH")]
    prefetch: Option<u16>,

    /// Publisher confirm timeout in seconds
    #[arg(long, env = "CONFIRM_TIMEOUT_SECONDS")]
    confirm_timeout_seconds: Option<u64>,

    /// Directory uploaded media is written under
    #[arg(long, env = "STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Media file to register as a new video and send to encode (repeatable)
    #[arg(long = "upload", value_name = "FILE")]
    uploads: Vec<PathBuf>,
}

impl Args {
    /// Load the config file, if any, and apply command-line overrides.
    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_yaml_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(url) = &self.amqp_url {
            config.amqp_url = url.clone();
        }
        if let Some(exchange) = &self.exchange {
            config.producer.exchange = exchange.clone();
        }
        if let Some(queue) = &self.result_queue {
            config.consumer.queue = queue.clone();
            config.consumer.routing_key = queue.clone();
        }
        if let Some(prefetch) = self.prefetch {
            config.consumer.prefetch = prefetch;
        }
        if let Some(secs) = self.confirm_timeout_seconds {
            config.producer.confirm_timeout = Duration::from_secs(secs);
        }
        if let Some(root) = &self.storage_root {
            config.storage.root = root.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    let config = args.resolve_config()?;

    info!("Starting Catalog Encoder");
    info!("  Exchange: {}", config.producer.exchange);
    info!("  Result queue: {}", config.consumer.queue);
    info!("  Prefetch: {}", config.consumer.prefetch);
    info!(
        "  Confirm timeout: {} seconds",
        config.producer.confirm_timeout.as_secs()
    );
    info!("  Storage root: {}", config.storage.root.display());

    // Connect to the broker
    let connection = AmqpConnection::connect(&config.amqp_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to AMQP broker: {}", e);
            e
        })?;
    connection
        .declare_topology(&config.producer.exchange, &config.consumer)
        .await?;
    let connection = Arc::new(connection);

    // Outbound: dispatcher -> encoder handler -> producer
    let channels = Arc::new(ChannelManager::new(connection.clone()));
    let producer: Arc<dyn MessageProducer> = Arc::new(BrokerProducer::new(
        config.producer.clone(),
        RoutingTable::default(),
        channels.clone(),
    ));

    let registry = HandlerRegistry::new()
        .register(
            EventType::VideoUploaded,
            Arc::new(DispatchToEncoder::new(producer)),
        )
        .register(EventType::VideoUploaded, Arc::new(LoggingEventHandler::new()));
    info!("Registered event handlers: {:?}", registry);
    let dispatcher = Arc::new(EventDispatcher::new(registry));

    // Persistence and blob storage
    let store = Arc::new(InMemoryVideoStore::new());
    let storage: Arc<dyn StorageService> = Arc::new(LocalFileStorage::new(&config.storage));
    let create_video = CreateVideo::new(store.clone(), dispatcher.clone());
    let upload_media = UploadVideoMedia::new(store.clone(), storage, dispatcher.clone());

    // Inbound: result consumer -> update media status
    let update_media_status = Arc::new(UpdateMediaStatus::new(store, dispatcher));
    let consumer = EncoderResultConsumer::new(update_media_status);
    let subscription = connection.subscribe(&config.consumer).await?;

    let cancel = CancellationToken::new();
    let consumer_cancel = cancel.clone();
    let consumer_handle =
        tokio::spawn(async move { consumer.run(subscription, consumer_cancel).await });

    for path in &args.uploads {
        match ingest_file(&create_video, &upload_media, path).await {
            Ok((video_id, stored)) => {
                info!(video_id = %video_id, path = %stored, "Video sent to encode")
            }
            Err(e) => error!("Failed to ingest {}: {}", path.display(), e),
        }
    }

    info!("Catalog Encoder running");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::Internal(format!("Failed to listen for shutdown signal: {}", e)))?;
    info!("Shutdown signal received");

    cancel.cancel();
    match consumer_handle.await {
        Ok(stats) => info!(
            "Consumer processed {} messages ({} applied)",
            stats.total(),
            stats.applied
        ),
        Err(e) => error!("Consumer task failed: {}", e),
    }

    if let Err(e) = channels.close().await {
        error!("Failed to close broker connection: {}", e);
    }

    info!("Catalog Encoder shutdown complete");
    Ok(())
}

// =============================================================================
// Startup Ingest
// =============================================================================

/// Register `path` as a new video and upload it as the primary media.
async fn ingest_file(
    create_video: &CreateVideo,
    upload_media: &UploadVideoMedia,
    path: &Path,
) -> Result<(VideoId, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Validation(format!("Invalid media file path: {}", path.display())))?
        .to_string();
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(&file_name)
        .to_string();
    let content = Bytes::from(tokio::fs::read(path).await?);

    let video_id = create_video
        .execute(CreateVideoInput {
            metadata: VideoMetadata {
                title,
                description: String::new(),
                year_launched: Utc::now().year() as u16,
                duration: 0.0,
                rating: Rating::L,
                opened: false,
            },
            categories: vec![],
            genres: vec![],
            cast_members: vec![],
        })
        .await?;

    let stored = upload_media
        .execute(UploadVideoMediaInput {
            video_id,
            media_type: MediaType::Video,
            content_type: content_type_for(path).to_string(),
            file_name,
            content,
        })
        .await?;

    Ok((video_id, stored))
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let lapin_directive: Directive = "lapin=warn"
        .parse()
        .map_err(|e| Error::Config(format!("Invalid log directive: {}", e)))?;

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(lapin_directive);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

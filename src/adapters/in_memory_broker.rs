//! In-process broker
//!
//! Implements the broker ports without a network. Publishes are recorded and
//! routed to bound queues; the confirmation outcome and channel closure can
//! be driven from outside, which makes failure paths reproducible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::ports::{
    BrokerChannel, BrokerConnection, InboundMessage, MessageAcker, MessageSubscription,
    PublishConfirmation,
};
use crate::error::{Error, Result};

/// How the broker answers publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmBehavior {
    #[default]
    Ack,
    Nack,
    /// Never answer; the publisher waits forever.
    Never,
}

/// A message accepted by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct Queue {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    acked: Arc<AtomicU64>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Some(tx),
            rx: Some(rx),
            acked: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    channels: Vec<Arc<InMemoryChannel>>,
    published: Vec<PublishedMessage>,
    confirm: ConfirmBehavior,
    queues: HashMap<String, Queue>,
    bindings: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    channels_created: AtomicU64,
    connection_closed: AtomicBool,
}

impl Inner {
    fn route(&self, message: &PublishedMessage) {
        let mut state = self.state.lock();
        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|(key, _)| *key == message.routing_key)
            .map(|(_, queue)| queue.clone())
            .collect();
        for queue in targets {
            let queue = state.queues.entry(queue).or_insert_with(Queue::new);
            if let Some(tx) = &queue.tx {
                let _ = tx.send(message.payload.clone());
            }
        }
        state.published.push(message.clone());
    }
}

/// Handle to an in-process broker. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection to this broker.
    pub fn connection(&self) -> Arc<dyn BrokerConnection> {
        Arc::new(InMemoryConnection {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn set_confirm_behavior(&self, behavior: ConfirmBehavior) {
        self.inner.state.lock().confirm = behavior;
    }

    /// Route publishes with `routing_key` to `queue`.
    pub fn bind(&self, queue: &str, routing_key: &str) {
        let mut state = self.inner.state.lock();
        state.queues.entry(queue.to_string()).or_insert_with(Queue::new);
        state
            .bindings
            .push((routing_key.to_string(), queue.to_string()));
    }

    /// Every message the broker accepted, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.state.lock().published.clone()
    }

    pub fn channels_created(&self) -> u64 {
        self.inner.channels_created.load(Ordering::SeqCst)
    }

    pub fn last_channel_confirms_enabled(&self) -> bool {
        self.inner
            .state
            .lock()
            .channels
            .last()
            .map(|c| c.confirms.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Close every channel from the broker side.
    pub fn close_channels(&self) {
        for channel in &self.inner.state.lock().channels {
            channel.open.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_connection_closed(&self) -> bool {
        self.inner.connection_closed.load(Ordering::SeqCst)
    }

    /// Push a raw message onto a queue.
    pub fn deliver(&self, queue: &str, payload: Vec<u8>) {
        let mut state = self.inner.state.lock();
        let queue = state.queues.entry(queue.to_string()).or_insert_with(Queue::new);
        if let Some(tx) = &queue.tx {
            let _ = tx.send(payload);
        }
    }

    /// End a queue: its subscription drains what is left, then ends.
    pub fn close_queue(&self, queue: &str) {
        if let Some(queue) = self.inner.state.lock().queues.get_mut(queue) {
            queue.tx = None;
        }
    }

    /// Subscribe to a queue. Each queue supports a single subscriber.
    pub fn subscribe(&self, queue: &str) -> InMemorySubscription {
        let mut state = self.inner.state.lock();
        let entry = state.queues.entry(queue.to_string()).or_insert_with(Queue::new);
        let rx = entry.rx.take().unwrap_or_else(|| {
            // Already taken: hand out a receiver that ends immediately.
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        });
        InMemorySubscription {
            rx,
            acked: Arc::clone(&entry.acked),
        }
    }

    /// Acknowledged deliveries on a queue.
    pub fn acked(&self, queue: &str) -> u64 {
        self.inner
            .state
            .lock()
            .queues
            .get(queue)
            .map(|q| q.acked.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// A standalone delivery, not tied to any queue.
    pub fn inbound(&self, payload: Vec<u8>) -> InboundMessage {
        InboundMessage::new(
            payload,
            Box::new(CountingAcker {
                acked: Arc::new(AtomicU64::new(0)),
            }),
        )
    }
}

// =============================================================================
// Connection / Channel
// =============================================================================

#[derive(Debug)]
struct InMemoryConnection {
    inner: Arc<Inner>,
}

#[async_trait]
impl BrokerConnection for InMemoryConnection {
    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>> {
        if self.inner.connection_closed.load(Ordering::SeqCst) {
            return Err(Error::Internal("connection closed".to_string()));
        }
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;

        let channel = Arc::new(InMemoryChannel {
            inner: Arc::clone(&self.inner),
            open: AtomicBool::new(true),
            confirms: AtomicBool::new(false),
        });
        self.inner.channels_created.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().channels.push(Arc::clone(&channel));
        Ok(channel)
    }

    async fn close(&self) -> Result<()> {
        self.inner.connection_closed.store(true, Ordering::SeqCst);
        for channel in &self.inner.state.lock().channels {
            channel.open.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct InMemoryChannel {
    inner: Arc<Inner>,
    open: AtomicBool,
    confirms: AtomicBool,
}

impl std::fmt::Debug for InMemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryChannel")
            .field("open", &self.is_open())
            .field("confirms", &self.confirms.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn enable_confirms(&self) -> Result<()> {
        tokio::task::yield_now().await;
        self.confirms.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<PublishConfirmation> {
        if !self.is_open() {
            return Err(Error::DeliveryFailed("channel is closed".to_string()));
        }

        let behavior = self.inner.state.lock().confirm;
        let message = PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
        };

        if !self.confirms.load(Ordering::SeqCst) {
            self.inner.route(&message);
            return Ok(PublishConfirmation::NotRequested);
        }

        match behavior {
            ConfirmBehavior::Ack => {
                self.inner.route(&message);
                Ok(PublishConfirmation::Ack)
            }
            ConfirmBehavior::Nack => Ok(PublishConfirmation::Nack),
            ConfirmBehavior::Never => std::future::pending().await,
        }
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Subscription
// =============================================================================

struct CountingAcker {
    acked: Arc<AtomicU64>,
}

#[async_trait]
impl MessageAcker for CountingAcker {
    async fn ack(&self) -> Result<()> {
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Subscription to an in-process queue.
#[derive(Debug)]
pub struct InMemorySubscription {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    acked: Arc<AtomicU64>,
}

#[async_trait]
impl MessageSubscription for InMemorySubscription {
    async fn next_message(&mut self) -> Option<Result<InboundMessage>> {
        let payload = self.rx.recv().await?;
        Some(Ok(InboundMessage::new(
            payload,
            Box::new(CountingAcker {
                acked: Arc::clone(&self.acked),
            }),
        )))
    }
}

//! # Event bus façade.
//!
//! [`EventBus`] is the public entry point: it owns the topic registry, the
//! closed flag, and the shutdown token, and routes every call to the right
//! topic worker, creating one on first use of a topic.
//!
//! ## Architecture
//! ```text
//!                     ┌────────────────────────────────┐
//!   publish ────────► │ EventBus                       │
//!   subscribe ──────► │  - closed: AtomicBool          │
//!   unsubscribe ────► │  - shutdown: CancellationToken │
//!   close ──────────► │  - registry: ArcSwap snapshot  │
//!                     └───────┬──────────────┬─────────┘
//!                             ▼              ▼
//!                      ┌────────────┐ ┌────────────┐
//!                      │ worker "a" │ │ worker "b" │    one task per topic
//!                      └──┬─────┬───┘ └─────┬──────┘
//!                         ▼     ▼           ▼
//!                    endpoint endpoint  endpoint         bounded, per subscription
//! ```
//!
//! ## Rules
//! - Topic lookup is lock-free; topic creation is copy-and-swap with retry.
//! - A worker task starts only after winning its registry slot.
//! - `publish` never blocks on admission: a full topic queue is an error.
//! - After [`close`](EventBus::close), publish fails fast and subscribe
//!   degrades to an inert subscription.
//!
//! ### Notes
//! Cloning the bus is cheap (one `Arc`); clones share all state.

mod registry;
mod subscription;
pub(crate) mod worker;

pub use subscription::{Subscription, SubscriptionId, TryRecvError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::BusConfig;
use crate::error::PublishError;
use registry::TopicRegistry;
use worker::{PublishRequest, SubscribeRequest, TopicHandle, TopicWorker, UnsubscribeRequest};

/// # Topic-partitioned publish/subscribe bus.
///
/// Publishers and subscribers rendezvous by topic name. Each topic is served
/// by one dedicated worker task that owns that topic's subscriber set; the
/// bus itself only resolves names to workers and enforces the closed state.
///
/// The payload type `T` is cloned once per receiving subscriber.
///
/// # Example
/// ```
/// use topicbus::EventBus;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new();
///
/// let mut sub = bus.subscribe("orders", 16).await;
/// bus.publish("orders", "order-1 created".to_string())
///     .await
///     .unwrap();
///
/// assert_eq!(sub.recv().await.as_deref(), Some("order-1 created"));
/// bus.close();
/// assert_eq!(sub.recv().await, None);
/// # }
/// ```
pub struct EventBus<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    config: BusConfig,
    closed: AtomicBool,
    shutdown: CancellationToken,
    registry: TopicRegistry<T>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus with [`BusConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with explicit queue capacities.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                registry: TopicRegistry::new(),
            }),
        }
    }

    /// Publishes `payload` to every current subscriber of `topic`.
    ///
    /// Creates the topic on first use. Admission to the topic's queue is
    /// non-blocking: a full queue fails with
    /// [`PublishError::Saturated`] instead of waiting. Once admitted, the
    /// call waits for the worker's ack, which reports either full delivery
    /// (`Ok`) or how many slow subscribers were skipped
    /// ([`PublishError::SlowConsumers`]).
    pub async fn publish(&self, topic: &str, payload: T) -> Result<(), PublishError> {
        let Some(handle) = self.topic_handle(topic) else {
            return Err(PublishError::Closed);
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        let request = PublishRequest {
            payload,
            ack: ack_tx,
        };
        match handle.publish.try_send(request) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                return Err(PublishError::Saturated {
                    topic: Arc::from(topic),
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(PublishError::Closed),
        }
        // A worker that exits mid-request drops the ack slot.
        ack_rx.await.unwrap_or(Err(PublishError::Closed))
    }

    /// Subscribes to `topic` with an endpoint of the given capacity
    /// (clamped to a minimum of 1).
    ///
    /// Creates the topic on first use. The returned subscription is already
    /// visible to every publish the worker processes after this call
    /// returns: the handshake completes only once the worker registered it.
    ///
    /// On a closed bus this does not fail; it returns an inert subscription
    /// whose endpoint is born closed. Check [`is_closed`](Self::is_closed)
    /// for a hard signal.
    pub async fn subscribe(&self, topic: &str, capacity: usize) -> Subscription<T> {
        let Some(handle) = self.topic_handle(topic) else {
            return Subscription::inert(Arc::from(topic));
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = SubscribeRequest {
            capacity,
            reply: reply_tx,
        };
        if handle.subscribe.send(request).await.is_err() {
            return Subscription::inert(Arc::from(topic));
        }
        match reply_rx.await {
            Ok(subscription) => subscription,
            Err(_) => Subscription::inert(Arc::from(topic)),
        }
    }

    /// Asks `topic`'s worker to stop delivering to subscription `id`.
    ///
    /// Best-effort and non-suspending: an unknown topic or id is a silent
    /// no-op, and a momentarily full removal queue falls back to a
    /// background re-send. Never creates a topic. The subscriber's endpoint
    /// stays open (see [`Subscription::recv`]).
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) {
        let Some(handle) = self.shared.registry.get(topic) else {
            return;
        };
        let request = UnsubscribeRequest { id };
        match handle.unsubscribe.try_send(request) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(request)) => {
                let sender = handle.unsubscribe.clone();
                tokio::spawn(async move {
                    let _ = sender.send(request).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Closes the bus. Idempotent and non-suspending.
    ///
    /// Sets the closed flag, fires the shutdown token every worker selects
    /// on, then swaps in an empty registry. Workers close all subscriber
    /// endpoints (the only path that does) and exit; buffered items remain
    /// readable until drained, after which `recv()` yields `None`.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Flag first, then the broadcast, then the swap: late topic
        // creators observe the flag, live workers observe the token.
        self.shared.shutdown.cancel();
        self.shared.registry.clear();
        debug!(workers = self.shared.registry.wins(), "bus closed");
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Sorted names of all topics created so far. Empty once the bus is
    /// closed.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        if self.is_closed() {
            return Vec::new();
        }
        self.shared.registry.names()
    }

    /// Resolves the worker handle for `topic`, creating the worker on first
    /// use. Returns `None` once the bus is closed.
    fn topic_handle(&self, topic: &str) -> Option<TopicHandle<T>> {
        if self.is_closed() {
            return None;
        }
        if let Some(handle) = self.shared.registry.get(topic) {
            return Some(handle);
        }

        let (handle, topic_worker) = TopicWorker::channel(
            Arc::from(topic),
            &self.shared.config,
            self.shared.shutdown.clone(),
        );
        let (registered, won) = self.shared.registry.insert(topic, handle);
        if won {
            // A close racing past the flag check above has already fired the
            // token; an unspawned worker leaves dead queues, which callers
            // see as `Closed`.
            if self.shared.shutdown.is_cancelled() {
                return None;
            }
            tokio::spawn(topic_worker.run());
        }
        Some(registered)
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

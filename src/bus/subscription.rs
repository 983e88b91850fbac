//! # Subscription handle and endpoint.
//!
//! A [`Subscription`] bundles what `subscribe` hands back: the id assigned by
//! the topic worker, the receive endpoint, and the release plumbing back to
//! that worker. The endpoint is a bounded queue owned exclusively by the
//! subscriber; the worker writes into it, and only the bus shutdown path
//! ever closes it.
//!
//! ## Rules
//! - `recv()` returning `None` means the bus shut down, never "you
//!   unsubscribed"
//! - releasing (explicitly or on drop) stops future deliveries but leaves
//!   already-buffered items readable
//! - id `0` marks an inert subscription: the bus was already closed at
//!   subscribe time and nothing was registered

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bus::worker::UnsubscribeRequest;

pub use tokio::sync::mpsc::error::TryRecvError;

/// Identifier of one subscription, unique within its topic worker's lifetime.
///
/// Ids come from a per-worker monotonic counter starting at 1.
/// `SubscriptionId` `0` is reserved for inert subscriptions and is never
/// registered with any worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    pub(crate) const INERT: SubscriptionId = SubscriptionId(0);

    /// Returns the raw id value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// # One subscriber's view of a topic.
///
/// Holds the receive endpoint plus the release channel to the owning worker.
/// Dropping the handle releases the subscription best-effort; the endpoint
/// itself closes only when the bus shuts down.
#[must_use]
pub struct Subscription<T> {
    id: SubscriptionId,
    topic: Arc<str>,
    endpoint: mpsc::Receiver<T>,
    release: mpsc::Sender<UnsubscribeRequest>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        id: SubscriptionId,
        topic: Arc<str>,
        endpoint: mpsc::Receiver<T>,
        release: mpsc::Sender<UnsubscribeRequest>,
    ) -> Self {
        Self {
            id,
            topic,
            endpoint,
            release,
        }
    }

    /// Builds the degraded handle returned once the bus is closed: the
    /// endpoint is born closed and the release channel leads nowhere.
    pub(crate) fn inert(topic: Arc<str>) -> Self {
        let (closed_tx, endpoint) = mpsc::channel(1);
        drop(closed_tx);
        let (release, orphan_rx) = mpsc::channel(1);
        drop(orphan_rx);
        Self {
            id: SubscriptionId::INERT,
            topic,
            endpoint,
            release,
        }
    }

    /// Returns the id the topic worker assigned to this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receives the next event.
    ///
    /// Returns `None` only after the bus has shut down and all buffered
    /// items were drained. An unsubscribed-but-open endpoint stays pending
    /// forever instead; wrap the call in `tokio::time::timeout` when a
    /// deadline is needed.
    pub async fn recv(&mut self) -> Option<T> {
        self.endpoint.recv().await
    }

    /// Non-blocking receive.
    ///
    /// [`TryRecvError::Empty`] means no event is buffered right now;
    /// [`TryRecvError::Disconnected`] means the bus shut down and the buffer
    /// is drained.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.endpoint.try_recv()
    }

    /// Asks the owning worker to stop delivering to this subscription.
    ///
    /// Best-effort and non-suspending: if the worker's removal queue is
    /// momentarily full, the request is re-sent from a background task
    /// (requires a tokio runtime in that case). The endpoint stays open:
    /// items already buffered remain readable and `recv()` keeps pending
    /// until bus shutdown. Releasing twice is harmless.
    pub fn unsubscribe(&self) {
        let request = UnsubscribeRequest { id: self.id };
        match self.release.try_send(request) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(request)) => {
                let release = self.release.clone();
                tokio::spawn(async move {
                    let _ = release.send(request).await;
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        // try_send only: Drop may run outside a runtime, and the worker
        // reaps closed endpoints on its next delivery attempt anyway.
        let _ = self.release.try_send(UnsubscribeRequest { id: self.id });
    }
}

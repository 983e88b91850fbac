//! # Per-topic worker.
//!
//! One worker task per topic owns every piece of that topic's mutable state:
//! the subscriber map, the parked senders of released subscriptions, and the
//! id counter. All subscribe/unsubscribe/publish traffic is serialized
//! through the worker's queues, so none of that state needs a lock.
//!
//! ## Architecture
//! ```text
//! subscribe   (cap 1, oneshot reply) ──┐
//! unsubscribe (bounded)              ──┼─► select! ─► subscribers: id → Sender
//! publish     (bounded, oneshot ack) ──┤     │        detached: Vec<Sender>
//! shutdown token                     ──┘     └─► try_send fan-out per publish
//! ```
//!
//! ## Rules
//! - The loop handles one request to completion before the next.
//! - Select is biased: shutdown first, then unsubscribe/subscribe, then
//!   publish; per-queue FIFO is unaffected.
//! - A full endpoint skips that delivery and is counted, never awaited.
//! - A closed endpoint (receiver dropped) is reaped at delivery time.
//! - Endpoints close exactly once, when the shutdown token fires.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::subscription::{Subscription, SubscriptionId};
use crate::config::BusConfig;
use crate::error::PublishError;

/// Handshake carried on the subscribe queue; the worker replies with the
/// fully registered subscription.
pub(crate) struct SubscribeRequest<T> {
    pub(crate) capacity: usize,
    pub(crate) reply: oneshot::Sender<Subscription<T>>,
}

/// Removal request; unknown ids are ignored.
pub(crate) struct UnsubscribeRequest {
    pub(crate) id: SubscriptionId,
}

/// Publish with its single-slot ack.
pub(crate) struct PublishRequest<T> {
    pub(crate) payload: T,
    pub(crate) ack: oneshot::Sender<Result<(), PublishError>>,
}

/// Sender bundle for one topic, stored in the registry and cloned out to
/// callers. Dropping every handle ends the worker's queues.
pub(crate) struct TopicHandle<T> {
    pub(crate) subscribe: mpsc::Sender<SubscribeRequest<T>>,
    pub(crate) unsubscribe: mpsc::Sender<UnsubscribeRequest>,
    pub(crate) publish: mpsc::Sender<PublishRequest<T>>,
}

impl<T> Clone for TopicHandle<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: self.subscribe.clone(),
            unsubscribe: self.unsubscribe.clone(),
            publish: self.publish.clone(),
        }
    }
}

/// Receiver half of a topic's queues plus the worker-owned state; consumed
/// by [`TopicWorker::run`].
pub(crate) struct TopicWorker<T> {
    topic: Arc<str>,
    subscribe: mpsc::Receiver<SubscribeRequest<T>>,
    unsubscribe: mpsc::Receiver<UnsubscribeRequest>,
    publish: mpsc::Receiver<PublishRequest<T>>,
    /// Clone of the unsubscribe sender, handed to each new subscription as
    /// its release channel.
    release: mpsc::Sender<UnsubscribeRequest>,
    shutdown: CancellationToken,
    subscribers: HashMap<SubscriptionId, mpsc::Sender<T>>,
    /// Senders of released subscriptions. Parked instead of dropped so the
    /// paired endpoint stays open; pruned once the receiver side is gone.
    detached: Vec<mpsc::Sender<T>>,
    next_id: u64,
}

impl<T: Clone + Send + 'static> TopicWorker<T> {
    /// Builds the queue pair for one topic. The worker is not running yet:
    /// the caller spawns [`run`](Self::run) only after the topic wins its
    /// registry slot, so a lost creation race discards everything unstarted.
    pub(crate) fn channel(
        topic: Arc<str>,
        config: &BusConfig,
        shutdown: CancellationToken,
    ) -> (TopicHandle<T>, TopicWorker<T>) {
        let (subscribe_tx, subscribe_rx) = mpsc::channel(1);
        let (unsubscribe_tx, unsubscribe_rx) = mpsc::channel(config.unsubscribe_capacity_clamped());
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_capacity_clamped());

        let handle = TopicHandle {
            subscribe: subscribe_tx,
            unsubscribe: unsubscribe_tx.clone(),
            publish: publish_tx,
        };
        let worker = TopicWorker {
            topic,
            subscribe: subscribe_rx,
            unsubscribe: unsubscribe_rx,
            publish: publish_rx,
            release: unsubscribe_tx,
            shutdown,
            subscribers: HashMap::new(),
            detached: Vec::new(),
            next_id: 1,
        };
        (handle, worker)
    }

    /// Serving loop. Runs until the shutdown token fires, then drops every
    /// sender it holds (the one place endpoints close) and exits.
    pub(crate) async fn run(mut self) {
        debug!(topic = %self.topic, "topic worker started");
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                Some(request) = self.unsubscribe.recv() => self.remove(request.id),

                Some(request) = self.subscribe.recv() => self.register(request),

                Some(request) = self.publish.recv() => self.fan_out(request),
            }
        }
        debug!(
            topic = %self.topic,
            subscribers = self.subscribers.len(),
            "topic worker closed"
        );
    }

    /// Registers a new subscription and replies through the handshake slot.
    ///
    /// The reply goes out before the sender is stored; a dropped reply
    /// receiver (caller gave up mid-handshake) leaves no trace. Callers that
    /// did get the reply are registered before this function returns, so
    /// every publish the worker processes afterwards sees them.
    fn register(&mut self, request: SubscribeRequest<T>) {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let capacity = request.capacity.max(1);
        let (endpoint_tx, endpoint_rx) = mpsc::channel(capacity);
        let subscription =
            Subscription::new(id, Arc::clone(&self.topic), endpoint_rx, self.release.clone());

        if request.reply.send(subscription).is_ok() {
            self.subscribers.insert(id, endpoint_tx);
            debug!(topic = %self.topic, id = %id, capacity, "subscriber registered");
        }
    }

    /// Removes a subscription without closing its endpoint.
    ///
    /// The sender is parked, not dropped: dropping it would close the
    /// subscriber's endpoint, and closure must signal bus shutdown only.
    fn remove(&mut self, id: SubscriptionId) {
        if let Some(sender) = self.subscribers.remove(&id) {
            self.detached.push(sender);
            debug!(topic = %self.topic, id = %id, "subscriber released");
        }
        self.detached.retain(|sender| !sender.is_closed());
    }

    /// Delivers one payload to every registered endpoint and acks once.
    ///
    /// Full endpoints are skipped for this payload and reported in the ack;
    /// endpoints whose receiver is gone are reaped.
    fn fan_out(&mut self, request: PublishRequest<T>) {
        let mut delivered = 0usize;
        let mut skipped = 0usize;
        let mut dead = Vec::new();

        for (id, sender) in &self.subscribers {
            match sender.try_send(request.payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    skipped += 1;
                    warn!(topic = %self.topic, id = %id, "endpoint full, delivery skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
            debug!(topic = %self.topic, id = %id, "endpoint dropped by subscriber, reaped");
        }

        let outcome = if skipped == 0 {
            Ok(())
        } else {
            Err(PublishError::SlowConsumers {
                topic: Arc::clone(&self.topic),
                skipped,
                delivered,
            })
        };
        let _ = request.ack.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::bus::subscription::TryRecvError;

    const WAIT: Duration = Duration::from_millis(100);

    fn spawn_worker(config: &BusConfig) -> (TopicHandle<u8>, CancellationToken) {
        let token = CancellationToken::new();
        let (handle, worker) = TopicWorker::<u8>::channel(Arc::from("t"), config, token.clone());
        tokio::spawn(worker.run());
        (handle, token)
    }

    async fn handshake(handle: &TopicHandle<u8>, capacity: usize) -> Subscription<u8> {
        let (reply_tx, reply_rx) = oneshot::channel();
        handle
            .subscribe
            .send(SubscribeRequest {
                capacity,
                reply: reply_tx,
            })
            .await
            .expect("worker accepts handshake");
        reply_rx.await.expect("worker replies")
    }

    async fn publish_roundtrip(handle: &TopicHandle<u8>, payload: u8) -> Result<(), PublishError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        handle
            .publish
            .send(PublishRequest {
                payload,
                ack: ack_tx,
            })
            .await
            .expect("worker accepts publish");
        ack_rx.await.expect("worker acks")
    }

    #[tokio::test]
    async fn ids_are_assigned_monotonically_from_one() {
        let (handle, _token) = spawn_worker(&BusConfig::default());
        let first = handshake(&handle, 1).await;
        let second = handshake(&handle, 1).await;
        assert_eq!(first.id().as_u64(), 1);
        assert_eq!(second.id().as_u64(), 2);
    }

    #[tokio::test]
    async fn released_endpoint_stays_open() {
        let (handle, _token) = spawn_worker(&BusConfig::default());
        let mut sub = handshake(&handle, 1).await;

        handle
            .unsubscribe
            .send(UnsubscribeRequest { id: sub.id() })
            .await
            .unwrap();
        // An acked publish proves the removal was processed first: nobody
        // is registered anymore, yet the endpoint must look idle, not closed.
        assert_eq!(publish_roundtrip(&handle, 9).await, Ok(()));
        assert!(matches!(sub.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn cancellation_closes_endpoints() {
        let (handle, token) = spawn_worker(&BusConfig::default());
        let mut sub = handshake(&handle, 1).await;

        token.cancel();
        assert_eq!(timeout(WAIT, sub.recv()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn abandoned_handshake_registers_nothing() {
        let (handle, _token) = spawn_worker(&BusConfig::default());
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);
        handle
            .subscribe
            .send(SubscribeRequest {
                capacity: 1,
                reply: reply_tx,
            })
            .await
            .unwrap();

        let mut sub = handshake(&handle, 1).await;
        // The abandoned handshake burned id 1 but left no subscriber behind.
        assert_eq!(sub.id().as_u64(), 2);
        assert_eq!(publish_roundtrip(&handle, 5).await, Ok(()));
        assert_eq!(timeout(WAIT, sub.recv()).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn admission_is_nonblocking_once_queue_is_full() {
        let config = BusConfig {
            publish_capacity: 1,
            unsubscribe_capacity: 1,
        };
        // Worker prepared but never spawned: the queue can only fill up.
        let (handle, _worker) =
            TopicWorker::<u8>::channel(Arc::from("t"), &config, CancellationToken::new());

        let (ack_tx, _ack_rx) = oneshot::channel();
        handle
            .publish
            .try_send(PublishRequest {
                payload: 1,
                ack: ack_tx,
            })
            .expect("first publish fits");

        let (ack_tx, _ack_rx) = oneshot::channel();
        let rejected = handle.publish.try_send(PublishRequest {
            payload: 2,
            ack: ack_tx,
        });
        assert!(matches!(
            rejected,
            Err(mpsc::error::TrySendError::Full(_))
        ));
    }

    #[tokio::test]
    async fn full_endpoint_is_skipped_and_counted() {
        let (handle, _token) = spawn_worker(&BusConfig::default());
        let mut narrow = handshake(&handle, 1).await;
        let mut wide = handshake(&handle, 8).await;

        assert_eq!(publish_roundtrip(&handle, 1).await, Ok(()));
        let err = publish_roundtrip(&handle, 2).await.unwrap_err();
        assert_eq!(
            err,
            PublishError::SlowConsumers {
                topic: Arc::from("t"),
                skipped: 1,
                delivered: 1,
            }
        );

        assert_eq!(timeout(WAIT, wide.recv()).await.unwrap(), Some(1));
        assert_eq!(timeout(WAIT, wide.recv()).await.unwrap(), Some(2));
        assert_eq!(timeout(WAIT, narrow.recv()).await.unwrap(), Some(1));
        assert!(matches!(narrow.try_recv(), Err(TryRecvError::Empty)));
    }
}

//! # Consumer attachment and lifecycle.
//!
//! [`EventBus::attach`] subscribes on behalf of a [`Consumer`] and spawns
//! the drain task feeding it. The returned [`ConsumerGuard`] owns that task.
//!
//! ## Architecture
//! ```text
//! publish ──► endpoint ──► drain task ──► consumer.on_event()
//!             (bounded)        │               └─► panic caught → logged
//!                              └─◄ ConsumerGuard::shutdown() / bus close
//! ```
//!
//! ## Rules
//! - One drain task per attachment, one event in flight at a time.
//! - A panicking consumer is logged and keeps its task; the event is lost.
//! - Guard shutdown releases the subscription and waits for the task; a
//!   bus close ends the task on its own (the endpoint reports
//!   end-of-stream).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::bus::EventBus;
use crate::consumers::Consumer;

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Attaches `consumer` to `topic` and starts draining events into it.
    ///
    /// The endpoint capacity comes from [`Consumer::queue_capacity`]. On a
    /// closed bus the subscription is inert and the drain task exits
    /// immediately; the guard is still returned and safe to shut down.
    pub async fn attach(&self, topic: &str, consumer: Arc<dyn Consumer<T>>) -> ConsumerGuard {
        let mut subscription = self.subscribe(topic, consumer.queue_capacity()).await;
        let name = consumer.name();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = stopped.cancelled() => {
                        subscription.unsubscribe();
                        break;
                    }

                    next = subscription.recv() => {
                        let Some(event) = next else { break };
                        let fut = consumer.on_event(&event);
                        if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
                            let info = {
                                let any = &*panic_err;
                                if let Some(msg) = any.downcast_ref::<&'static str>() {
                                    (*msg).to_string()
                                } else if let Some(msg) = any.downcast_ref::<String>() {
                                    msg.clone()
                                } else {
                                    "unknown panic".to_string()
                                }
                            };
                            error!(consumer = name, panic = %info, "consumer panicked, event dropped");
                        }
                    }
                }
            }
            debug!(consumer = name, "consumer detached");
        });

        ConsumerGuard { name, stop, task }
    }
}

/// Handle to one attached consumer's drain task.
///
/// Dropping the guard does not detach the consumer; call
/// [`shutdown`](ConsumerGuard::shutdown) for an orderly stop, or close the
/// bus, which ends every drain task.
#[must_use]
pub struct ConsumerGuard {
    name: &'static str,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsumerGuard {
    /// Name of the consumer this guard drives.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the drain task, releasing the subscription first.
    ///
    /// An `on_event` call already in flight completes before the task
    /// exits; events still buffered on the endpoint are discarded with it.
    pub async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;

    const WAIT: Duration = Duration::from_millis(100);

    struct Counting {
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Consumer<u32> for Counting {
        async fn on_event(&self, _event: &u32) {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct Flaky {
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Consumer<u32> for Flaky {
        async fn on_event(&self, event: &u32) {
            if *event == 0 {
                panic!("boom");
            }
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    async fn wait_for_hits(hits: &AtomicUsize, want: usize) {
        timeout(WAIT, async {
            while hits.load(Ordering::Relaxed) < want {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("consumer caught up");
    }

    #[tokio::test]
    async fn attached_consumer_receives_events_until_shutdown() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let guard = bus
            .attach(
                "t",
                Arc::new(Counting {
                    hits: Arc::clone(&hits),
                }),
            )
            .await;
        assert_eq!(guard.name(), "counting");

        for i in 0..3u32 {
            bus.publish("t", i).await.unwrap();
        }
        wait_for_hits(&hits, 3).await;

        guard.shutdown().await;
        bus.publish("t", 9).await.unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn panicking_consumer_keeps_draining() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let guard = bus
            .attach(
                "t",
                Arc::new(Flaky {
                    hits: Arc::clone(&hits),
                }),
            )
            .await;

        bus.publish("t", 0).await.unwrap(); // panics inside on_event
        bus.publish("t", 1).await.unwrap();
        wait_for_hits(&hits, 1).await;

        guard.shutdown().await;
    }

    #[tokio::test]
    async fn attach_on_closed_bus_is_inert() {
        let bus = EventBus::<u32>::new();
        bus.close();

        let hits = Arc::new(AtomicUsize::new(0));
        let guard = bus
            .attach(
                "t",
                Arc::new(Counting {
                    hits: Arc::clone(&hits),
                }),
            )
            .await;

        guard.shutdown().await;
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn bus_close_ends_the_drain_task() {
        let bus = EventBus::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let guard = bus
            .attach(
                "t",
                Arc::new(Counting {
                    hits: Arc::clone(&hits),
                }),
            )
            .await;

        bus.publish("t", 1).await.unwrap();
        wait_for_hits(&hits, 1).await;

        bus.close();
        // The endpoint closes, the task exits on its own; shutdown is then
        // a no-op join.
        timeout(WAIT, guard.shutdown()).await.unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}

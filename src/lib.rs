//! # topicbus
//!
//! **topicbus** is an embedded, topic-partitioned publish/subscribe bus for
//! tokio applications.
//!
//! Publishers and subscribers rendezvous by topic name. Each topic gets one
//! dedicated worker task that owns that topic's subscriber set, so no lock
//! guards the hot path; the topic lookup itself is a lock-free snapshot
//! read. Every subscriber endpoint is a bounded queue with an explicit
//! slow-consumer policy: a full endpoint is skipped for that message and
//! reported, never awaited.
//!
//! ## Architecture
//! ```text
//!  publisher ──publish────► ┌───────────────────────────────┐
//!  publisher ──publish────► │ EventBus                      │ lock-free reads,
//!  subscriber ─subscribe──► │  registry: {topic → handle}   │ copy-and-swap
//!                           │  closed flag + shutdown token │ inserts
//!                           └───────┬───────────────┬───────┘
//!                                   ▼               ▼
//!                           ┌──────────────┐ ┌──────────────┐  one task per topic:
//!                           │ worker "auth"│ │ worker "jobs"│  serialized subscribe /
//!                           │  subscribers │ │  subscribers │  unsubscribe / publish
//!                           └──┬────────┬──┘ └──────┬───────┘
//!                              ▼        ▼           ▼
//!                          endpoint  endpoint   endpoint        bounded, owned by
//!                              │        │           │           the subscriber
//!                              ▼        ▼           ▼
//!                           recv()   recv()    Consumer::on_event()
//! ```
//!
//! ## Delivery contract
//! - Fan-out is at-most-once per subscriber per publish: a full endpoint is
//!   skipped and the publish reports [`PublishError::SlowConsumers`].
//! - `publish` never blocks on admission: a full topic queue yields
//!   [`PublishError::Saturated`] immediately.
//! - An endpoint closes (`recv()` returns `None`) only when the bus shuts
//!   down; unsubscribing leaves it open and silent.
//! - After [`EventBus::close`], publishing fails with
//!   [`PublishError::Closed`] and subscribing hands out inert subscriptions.
//! - Per topic, subscribers see events in publish-ack order; there is no
//!   ordering across topics.
//!
//! ## Features
//! | Area | Description | Key types |
//! |---|---|---|
//! | **Publish/subscribe** | Topic-partitioned fan-out with bounded endpoints. | [`EventBus`], [`Subscription`] |
//! | **Consumers** | Callback-style draining with panic isolation. | [`Consumer`], [`ConsumerGuard`] |
//! | **Errors** | Typed publish outcomes with retryability. | [`PublishError`] |
//! | **Configuration** | Per-topic queue capacities. | [`BusConfig`] |
//!
//! ## Quick example
//! ```
//! use topicbus::EventBus;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = EventBus::new();
//!
//!     let mut orders = bus.subscribe("orders", 16).await;
//!     bus.publish("orders", "order-1 created".to_string())
//!         .await
//!         .expect("delivered");
//!
//!     assert_eq!(orders.recv().await.as_deref(), Some("order-1 created"));
//!
//!     bus.close();
//!     assert_eq!(orders.recv().await, None); // end-of-stream, bus is gone
//! }
//! ```
mod bus;
mod config;
mod consumers;
mod error;

// ---- Public re-exports ----

pub use bus::{EventBus, Subscription, SubscriptionId, TryRecvError};
pub use config::BusConfig;
pub use consumers::{Consumer, ConsumerGuard};
pub use error::PublishError;

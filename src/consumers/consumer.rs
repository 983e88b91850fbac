//! # Consumer trait.
//!
//! Provides [`Consumer`], the callback-style alternative to polling a
//! [`Subscription`](crate::Subscription) by hand: attach an implementation
//! to a topic with [`EventBus::attach`](crate::EventBus::attach) and a
//! dedicated drain task feeds it.
//!
//! Each attached consumer gets:
//! - **Dedicated drain task** (runs independently)
//! - **Its own endpoint** (capacity via [`Consumer::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged, the task continues)
//!
//! ## Rules
//! - Events are handled sequentially (FIFO) per consumer.
//! - A slow consumer only backs up its own endpoint; once it is full,
//!   publishes skip it (at-most-once delivery) and report the skip.
//! - Consumers never block publishers or each other.

use async_trait::async_trait;

/// # Asynchronous topic consumer.
///
/// Implementations are attached with
/// [`EventBus::attach`](crate::EventBus::attach) and invoked from a
/// dedicated drain task, one event at a time.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; a panic is caught and logged, and the event
///   that caused it is dropped.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use topicbus::Consumer;
///
/// struct Audit;
///
/// #[async_trait]
/// impl Consumer<String> for Audit {
///     async fn on_event(&self, event: &String) {
///         println!("[audit] {event}");
///     }
///
///     fn name(&self) -> &'static str { "audit" }
/// }
/// ```
#[async_trait]
pub trait Consumer<T>: Send + Sync + 'static {
    /// Handles a single event.
    ///
    /// Called from the drain task, never in the publisher's context. Events
    /// arrive in the order they were delivered to this consumer's endpoint.
    async fn on_event(&self, event: &T);

    /// Returns the consumer name used in logs.
    ///
    /// Prefer short, descriptive names (e.g., "metrics", "audit"). The
    /// default uses `type_name::<Self>()`, which can be verbose; override
    /// it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the endpoint capacity requested at attach time.
    ///
    /// While the endpoint is full, publishes to the topic skip this
    /// consumer and report it as slow. Clamped to a minimum of 1.
    ///
    /// Default: 64.
    fn queue_capacity(&self) -> usize {
        64
    }
}

//! # Bus configuration.
//!
//! Provides [`BusConfig`], the construction-time settings for
//! [`EventBus`](crate::EventBus).
//!
//! Capacities are per topic worker: every topic the bus creates gets its own
//! publish and unsubscribe queues sized from this config.
//!
//! ## Sentinel values
//! - `publish_capacity = 0` → clamped to 1 (smallest bounded queue)
//! - `unsubscribe_capacity = 0` → clamped to 1

/// Construction-time configuration for an event bus.
///
/// ## Field semantics
/// - `publish_capacity`: inbound publish queue per topic (min 1; clamped)
/// - `unsubscribe_capacity`: removal request queue per topic (min 1; clamped)
///
/// ## Notes
/// Subscriber endpoint capacity is not configured here: callers choose it per
/// subscription at `subscribe` time (also clamped to a minimum of 1).
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Capacity of each topic's inbound publish queue.
    ///
    /// Publishing to a topic whose queue is full fails immediately with
    /// [`PublishError::Saturated`](crate::PublishError::Saturated); the bus
    /// never blocks a publisher waiting for queue space.
    pub publish_capacity: usize,

    /// Capacity of each topic's unsubscribe request queue.
    ///
    /// When momentarily full, removal requests are re-sent from a background
    /// task rather than blocking the caller.
    pub unsubscribe_capacity: usize,
}

impl BusConfig {
    /// Returns the publish queue capacity clamped to a minimum of 1.
    ///
    /// Topic workers use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn publish_capacity_clamped(&self) -> usize {
        self.publish_capacity.max(1)
    }

    /// Returns the unsubscribe queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn unsubscribe_capacity_clamped(&self) -> usize {
        self.unsubscribe_capacity.max(1)
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `publish_capacity = 256` (absorbs publish bursts per topic)
    /// - `unsubscribe_capacity = 16` (removal traffic is sparse)
    fn default() -> Self {
        Self {
            publish_capacity: 256,
            unsubscribe_capacity: 16,
        }
    }
}

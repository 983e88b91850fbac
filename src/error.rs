//! Error types produced by bus operations.
//!
//! One enum, [`PublishError`], covers every failing outcome of
//! [`EventBus::publish`](crate::EventBus::publish). The other operations do
//! not fail: `subscribe` degrades to an inert subscription once the bus is
//! closed, and unsubscribing an unknown topic or id is a silent no-op.
//!
//! The type provides helper methods (`as_label`, `as_message`) for
//! logging/metrics and [`PublishError::is_retryable`] for callers deciding
//! whether to back off and try again.

use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by publishing to the bus.
///
/// `Saturated` is transient (retry after backoff); `Closed` is terminal for
/// the bus instance; `SlowConsumers` reports a partial delivery that already
/// happened and is never retried by the bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The bus was closed before or during the operation.
    #[error("bus is closed")]
    Closed,

    /// The topic's inbound publish queue was full; nothing was delivered.
    #[error("publish queue full for topic \"{topic}\"")]
    Saturated {
        /// Topic whose queue rejected the publish.
        topic: Arc<str>,
    },

    /// At least one subscriber endpoint was full at delivery time. The
    /// payload still reached every other subscriber and is not re-sent to
    /// the slow ones.
    #[error("skipped {skipped} slow subscriber(s) on topic \"{topic}\" ({delivered} delivered)")]
    SlowConsumers {
        /// Topic the publish was addressed to.
        topic: Arc<str>,
        /// Endpoints skipped because they were at capacity.
        skipped: usize,
        /// Endpoints that accepted the payload.
        delivered: usize,
    },
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use topicbus::PublishError;
    ///
    /// assert_eq!(PublishError::Closed.as_label(), "bus_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Closed => "bus_closed",
            PublishError::Saturated { .. } => "topic_saturated",
            PublishError::SlowConsumers { .. } => "slow_consumer",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PublishError::Closed => "bus closed".to_string(),
            PublishError::Saturated { topic } => format!("publish queue full: topic={topic}"),
            PublishError::SlowConsumers {
                topic,
                skipped,
                delivered,
            } => {
                format!("slow subscribers: topic={topic} skipped={skipped} delivered={delivered}")
            }
        }
    }

    /// Indicates whether the failed publish is worth retrying.
    ///
    /// Returns `true` only for [`PublishError::Saturated`]: the topic queue
    /// may drain. `Closed` is permanent, and `SlowConsumers` already
    /// delivered to everyone it could (at-most-once per subscriber).
    ///
    /// # Example
    /// ```
    /// use topicbus::PublishError;
    ///
    /// let saturated = PublishError::Saturated { topic: "jobs".into() };
    /// assert!(saturated.is_retryable()); // true
    ///
    /// assert!(!PublishError::Closed.is_retryable()); // false
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Saturated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let saturated = PublishError::Saturated { topic: "t".into() };
        let slow = PublishError::SlowConsumers {
            topic: "t".into(),
            skipped: 1,
            delivered: 2,
        };
        assert_eq!(PublishError::Closed.as_label(), "bus_closed");
        assert_eq!(saturated.as_label(), "topic_saturated");
        assert_eq!(slow.as_label(), "slow_consumer");
    }

    #[test]
    fn only_saturation_is_retryable() {
        let saturated = PublishError::Saturated { topic: "t".into() };
        let slow = PublishError::SlowConsumers {
            topic: "t".into(),
            skipped: 1,
            delivered: 0,
        };
        assert!(saturated.is_retryable());
        assert!(!slow.is_retryable());
        assert!(!PublishError::Closed.is_retryable());
    }

    #[test]
    fn display_names_the_topic() {
        let err = PublishError::SlowConsumers {
            topic: "metrics".into(),
            skipped: 2,
            delivered: 5,
        };
        let text = err.to_string();
        assert!(text.contains("metrics"));
        assert!(text.contains('2'));
        assert!(text.contains('5'));
    }
}

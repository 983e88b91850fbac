//! # Callback-style consumers.
//!
//! Polling a [`Subscription`](crate::Subscription) by hand suits request
//! flows; long-lived listeners usually want a callback. [`Consumer`] is
//! that callback, and [`EventBus::attach`](crate::EventBus::attach) wires
//! it to a topic behind a dedicated drain task owned by a [`ConsumerGuard`].

mod consumer;
mod guard;

pub use consumer::Consumer;
pub use guard::ConsumerGuard;

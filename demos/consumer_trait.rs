//! # Consumer Trait Example
//!
//! Shows the callback-style API: an audit log attaches to a topic and a
//! guard-owned drain task feeds it, one event at a time.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example consumer_trait
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use topicbus::{Consumer, EventBus};

struct AuditLog;

#[async_trait]
impl Consumer<String> for AuditLog {
    async fn on_event(&self, event: &String) {
        println!("[audit] {event}");
    }

    fn name(&self) -> &'static str {
        "audit"
    }

    fn queue_capacity(&self) -> usize {
        32
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bus = EventBus::new();
    let guard = bus.attach("audit.trail", Arc::new(AuditLog)).await;

    for i in 1..=3 {
        bus.publish("audit.trail", format!("entry {i}")).await?;
    }

    // A publish ack means "queued on the endpoint"; give the drain task a
    // moment to work through the buffer before detaching.
    tokio::time::sleep(Duration::from_millis(50)).await;

    guard.shutdown().await;
    bus.close();
    Ok(())
}

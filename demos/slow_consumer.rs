//! # Slow Consumer Example
//!
//! One subscriber never drains its capacity-1 endpoint, so repeated
//! publishes report partial delivery while the healthy subscriber keeps
//! receiving everything.
//!
//! ## Run
//! ```bash
//! cargo run --example slow_consumer
//! ```

use topicbus::{EventBus, PublishError};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let bus = EventBus::new();

    let mut stuck = bus.subscribe("ticks", 1).await;
    let mut healthy = bus.subscribe("ticks", 16).await;

    for tick in 0..4u32 {
        match bus.publish("ticks", tick).await {
            Ok(()) => println!("tick {tick}: delivered to everyone"),
            Err(err @ PublishError::SlowConsumers { .. }) => {
                println!(
                    "tick {tick}: {err} (label={}, retryable={})",
                    err.as_label(),
                    err.is_retryable()
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    while let Ok(tick) = healthy.try_recv() {
        println!("healthy got {tick}");
    }
    println!("stuck got {:?}", stuck.try_recv().ok());

    bus.close();
    Ok(())
}

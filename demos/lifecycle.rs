//! # Lifecycle Signaling Example
//!
//! Shows the bus decoupling application lifecycle from the modules that
//! react to it: three modules subscribe to one lifecycle topic, the app
//! publishes start and stop signals, and every module winds down on its own.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example lifecycle
//! ```

use topicbus::EventBus;

#[derive(Clone, Debug)]
enum Signal {
    Start,
    Stop,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bus = EventBus::new();

    let mut modules = Vec::new();
    for name in ["http", "storage", "metrics"] {
        let mut sub = bus.subscribe("app.lifecycle", 8).await;
        modules.push(tokio::spawn(async move {
            while let Some(signal) = sub.recv().await {
                println!("[{name}] observed {signal:?}");
                if matches!(signal, Signal::Stop) {
                    break;
                }
            }
            println!("[{name}] wound down");
        }));
    }

    bus.publish("app.lifecycle", Signal::Start).await?;
    bus.publish("app.lifecycle", Signal::Stop).await?;

    for module in modules {
        module.await?;
    }
    bus.close();
    Ok(())
}

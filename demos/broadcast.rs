//! # Example: broadcast
//!
//! Three isolated contexts talk over one named broadcast channel.
//!
//! Shows how to:
//! - Create contexts from a [`Host`].
//! - Post structured values and receive per-context copies.
//! - Close an instance and observe that it goes silent.
//!
//! ## Flow
//! ```text
//! ctx-0 "jobs".post(job) ──► hub group "jobs" ──┬──► ctx-1 consumer ──► inbox ──► recv()
//!                                               └──► ctx-2 consumer ──► inbox ──► recv()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=sandbox_globals=debug cargo run --example broadcast
//! ```

use std::time::Duration;

use sandbox_globals::{Config, Host, Value};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    let host = Host::new(Config::default());

    let producer = host.context();
    let workers = [host.context(), host.context()];

    let tx = producer.broadcast_channel("jobs");
    let mut rxs: Vec<_> = workers.iter().map(|w| w.broadcast_channel("jobs")).collect();

    for id in 0..3 {
        let job = Value::object([
            ("id", Value::from(id)),
            ("tags", Value::array(["fast", "cheap"])),
        ]);
        tx.post(&job)?;
    }

    for (worker, rx) in workers.iter().zip(rxs.iter_mut()) {
        for _ in 0..3 {
            let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await?
                .ok_or_else(|| anyhow::anyhow!("channel closed"))?;
            println!(
                "[{}] got {:?} from {} (seq {})",
                worker.id(),
                ev.data.get("id"),
                ev.origin,
                ev.seq
            );
        }
    }

    rxs[1].close();
    tx.post(&Value::from("after close"))?;
    let late = tokio::time::timeout(Duration::from_millis(100), rxs[0].recv()).await?;
    println!("[{}] late message: {:?}", workers[0].id(), late.map(|e| e.data));
    println!("[{}] closed: {}", workers[1].id(), rxs[1].is_closed());

    Ok(())
}

//! Batch dispatch service.
//!
//! # Architecture Overview
//!
//! ```text
//!     POST /api/v1/bulk-transactions
//!     ───────────────────────────────▶ http (request id, trace, limits)
//!                                        │
//!                                        ▼
//!                                  BatchService ── validation
//!                                        │
//!                                        ▼
//!                                   Dispatcher ──▶ WorkerPool (N long-lived workers)
//!                                        │              │ one job per transaction
//!                                        │              ▼
//!                                        │        ResilientCaller
//!                                        │         deadline → breaker → invoke → retry
//!                                        │              │
//!                                        │              ▼
//!                                        │        downstream transaction service
//!                                        ▼
//!     200 BatchResponse  ◀──────────  aggregator (input order)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use batch_dispatch::batch::BatchService;
use batch_dispatch::config::{load_config, DispatchConfig};
use batch_dispatch::downstream::HttpInvoker;
use batch_dispatch::http::HttpServer;
use batch_dispatch::lifecycle::{signals, Shutdown};
use batch_dispatch::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "batch-dispatch")]
#[command(about = "Batch transaction dispatch service", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => DispatchConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "batch-dispatch starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        pool_size = config.pool.size,
        downstream = %config.downstream.base_url,
        call_timeout_ms = config.timeouts.call_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let invoker = Arc::new(HttpInvoker::new(&config.downstream)?);
    let service = Arc::new(BatchService::from_config(&config, invoker));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(&config, service.clone());
    let stop = shutdown.clone();
    server.run(listener, async move { stop.wait().await }).await?;

    let grace = Duration::from_secs(config.timeouts.shutdown_grace_secs);
    if !service.dispatcher().pool().shutdown(grace).await {
        tracing::warn!("Shutdown grace period elapsed with work still in flight");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Worker: hosts the suspension store, the supervisor, the callback ingress
//! and the workflow API.
//!
//! ## Run with
//! ```bash
//! HTTP_API_HOST=http://localhost:8000 \
//! TESSERA_WORKER_HTTP_CALLBACK=http://localhost:8001/callback \
//! cargo run --bin tessera-worker
//! ```

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tessera::config::{HttpApiSettings, WorkerSettings};
use tessera::executor::TASK_QUEUE;
use tessera::prelude::*;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let worker = WorkerSettings::from_env()?;
    let api = HttpApiSettings::from_env()?;
    info!(
        identity = %worker.identity(),
        task_queue = TASK_QUEUE,
        service = %api.host,
        callback = %worker.http_callback,
        "starting worker"
    );

    let store = Arc::new(InMemorySuspensionStore::new());
    let client = HttpApiClient::new(&api.host, api.timeout())?;
    let step = HttpDispatchStep::new(client, &worker.http_callback)?;

    let mut supervisor = Supervisor::new(store);
    supervisor.register(Arc::new(step));
    let runtime = Arc::new(Runtime::new(supervisor));

    let shutdown = CancellationToken::new();
    let pruner = tokio::spawn(prune_periodically(runtime.clone(), shutdown.clone()));

    let listener = TcpListener::bind(worker.listen_addr()).await?;
    let server = tokio::spawn(tessera::ingress::serve(listener, runtime, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Received SIGINT, shutting down");
    shutdown.cancel();

    server.await??;
    pruner.await?;
    info!("Shutdown complete");
    Ok(())
}

/// Drops resolved suspensions and finished workflows older than one interval.
async fn prune_periodically(runtime: Arc<Runtime>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let cutoff = Utc::now() - chrono::Duration::seconds(PRUNE_INTERVAL.as_secs() as i64);
        match runtime.store().prune_resolved(cutoff).await {
            Ok(0) => {}
            Ok(pruned) => info!(pruned, "pruned resolved suspensions"),
            Err(e) => warn!(error = %e, "failed to prune suspensions"),
        }
        let forgotten = runtime.forget_finished(cutoff);
        if forgotten > 0 {
            info!(forgotten, "forgot finished workflows");
        }
    }
}

//! Simulated Callback-Emitting Service.
//!
//! ## Run with
//! ```bash
//! cargo run --bin tessera-service
//! ```

use std::time::Duration;
use tessera::config::ServiceSettings;
use tessera::CancellationToken;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ServiceSettings::from_env()?;
    let client = reqwest::Client::builder().timeout(CALLBACK_TIMEOUT).build()?;
    let listener = TcpListener::bind(settings.listen_addr()).await?;

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(tessera::service::serve(listener, client, shutdown.clone()));

    tokio::signal::ctrl_c().await?;
    info!("Received SIGINT, shutting down");
    shutdown.cancel();
    server.await??;
    Ok(())
}

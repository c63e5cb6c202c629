#![allow(dead_code)]

pub mod tracing_capture;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tessera::executor::{ActivityOptions, DispatchStep, HttpDispatchStep};
use tessera::prelude::*;
use tessera::storage::SuspensionStatus;
use tokio::net::TcpListener;

/// A running worker on a loopback port.
pub struct TestWorker {
    pub addr: SocketAddr,
    pub runtime: Arc<Runtime>,
    pub shutdown: CancellationToken,
}

impl TestWorker {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Handle of the first suspension that has been acknowledged by the service.
    pub async fn suspended_handle(&self) -> ContinuationHandle {
        loop {
            let open = self.runtime.store().outstanding().await.unwrap();
            if let Some(s) = open
                .iter()
                .find(|s| s.status() == SuspensionStatus::Suspended)
            {
                return s.handle();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for TestWorker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Worker whose dispatch step talks HTTP to `service`.
pub async fn spawn_http_worker(service: &str, options: ActivityOptions) -> TestWorker {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = HttpApiClient::new(service, Duration::from_secs(5)).unwrap();
    let step = HttpDispatchStep::new(client, &format!("http://{addr}/callback")).unwrap();
    start_worker(listener, Arc::new(step), options)
}

/// Worker with an arbitrary dispatch step.
pub async fn spawn_worker(step: Arc<dyn DispatchStep>, options: ActivityOptions) -> TestWorker {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    start_worker(listener, step, options)
}

fn start_worker(
    listener: TcpListener,
    step: Arc<dyn DispatchStep>,
    options: ActivityOptions,
) -> TestWorker {
    let addr = listener.local_addr().unwrap();
    let mut supervisor = Supervisor::new(Arc::new(InMemorySuspensionStore::new()));
    supervisor.register(step);
    let runtime = Arc::new(Runtime::new(supervisor).with_activity_options(options));
    let shutdown = CancellationToken::new();
    tokio::spawn(tessera::ingress::serve(
        listener,
        runtime.clone(),
        shutdown.clone(),
    ));
    TestWorker {
        addr,
        runtime,
        shutdown,
    }
}

/// The simulated Callback-Emitting Service on a loopback port.
pub async fn spawn_service() -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(tessera::service::serve(
        listener,
        reqwest::Client::new(),
        shutdown.clone(),
    ));
    (format!("http://{addr}"), shutdown)
}

/// A base URL nothing listens on.
pub async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Retry policy with millisecond delays.
pub fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(40),
        backoff_multiplier: 2.0,
    }
}

//! Starts one `CallServiceWorkflow` on a worker and waits for its result.
//!
//! ## Run with
//! ```bash
//! TESSERA_CLUSTER_HOST=http://localhost:8001 \
//! cargo run --bin tessera-client -- --ttr 1 --ttc 10 -a complete
//! ```

use clap::Parser;
use std::time::Instant;
use tessera::config::ClusterSettings;
use tessera::executor::{CallServiceWorkflowInput, WorkflowStatus};
use tessera::gateway::WorkflowClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ActivityAction {
    Heartbeat,
    Complete,
    Fail,
    #[value(name = "report_cancellation")]
    ReportCancellation,
}

impl ActivityAction {
    fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Heartbeat => "heartbeat",
            ActivityAction::Complete => "complete",
            ActivityAction::Fail => "fail",
            ActivityAction::ReportCancellation => "report_cancellation",
        }
    }
}

#[derive(Debug, clap::Parser)]
#[command(name = "tessera-client", about = "Run a CallServiceWorkflow and wait for its result")]
struct Args {
    /// Seconds the service waits before acknowledging the request
    #[arg(long = "time-to-request", visible_alias = "ttr", default_value_t = 1)]
    time_to_request: u64,

    /// Seconds the service waits before calling back
    #[arg(long = "time-to-callback", visible_alias = "ttc", default_value_t = 10)]
    time_to_callback: u64,

    /// Action the service performs in its callback
    #[arg(short = 'a', long = "activity-action", value_enum, default_value_t = ActivityAction::Complete)]
    activity_action: ActivityAction,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cluster = ClusterSettings::from_env()?;
    let client = WorkflowClient::new(&cluster.host)?;

    let input = CallServiceWorkflowInput {
        sleep_until_200: args.time_to_request,
        sleep_until_callback: args.time_to_callback,
        action: args.activity_action.as_str().to_string(),
    };
    let started = Instant::now();
    let workflow_id = client.start(&input).await?;
    info!(workflow_id = %workflow_id, namespace = %cluster.namespace, ?input, "workflow started");

    let view = tokio::select! {
        view = client.wait(workflow_id) => view?,
        _ = tokio::signal::ctrl_c() => {
            warn!(workflow_id = %workflow_id, "interrupted, cancelling workflow");
            client.cancel(workflow_id).await?;
            client.wait(workflow_id).await?
        }
    };

    let elapsed = started.elapsed();
    match view.status {
        WorkflowStatus::Succeeded => info!(
            elapsed_secs = elapsed.as_secs_f64(),
            output = ?view.output,
            "workflow succeeded"
        ),
        _ => warn!(
            elapsed_secs = elapsed.as_secs_f64(),
            error = view.error.as_deref().unwrap_or("unknown"),
            "workflow failed"
        ),
    }
    Ok(())
}

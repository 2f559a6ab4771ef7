use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loadgen::{
    scenario, Config, Fanout, HttpExecutor, Pacing, Scheduler, SummarySink, Target, TracingSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadgen=info,traffic_model=info".into()),
        )
        .init();

    // Everything below is fixed for the lifetime of the run
    let config = Config::from_env()?;
    let target = Target::new(config.target_host.clone());
    let tasks = scenario::gateway_traffic(&target, &config)?;

    info!(
        target = %target.base(),
        users = config.users,
        run_time_secs = config.run_time.map(|d| d.as_secs()),
        tasks = tasks.len(),
        "Load generator configured"
    );

    let summary = Arc::new(SummarySink::new()?);
    let sink = Fanout::new()
        .with(Arc::new(TracingSink))
        .with(summary.clone());

    let scheduler = Scheduler::new(tasks, HttpExecutor::new(config.request_timeout), Arc::new(sink))
        .with_pacing(Pacing {
            think_time: config.think_time,
            ramp_up: config.ramp_up,
        })
        .with_seed(config.seed);

    let stop = CancellationToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, stopping virtual users");
                    stop.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
        });
    }

    let report = scheduler.run(config.users, config.run_time, stop).await;
    let summary = summary.summary();

    info!(
        run_id = %report.run_id,
        requests = summary.requests,
        failures = summary.failures,
        skipped = summary.skipped,
        "Run summary\n{}",
        summary
    );
    debug!(summary = %serde_json::to_string(&summary)?, "Run summary as JSON");

    Ok(())
}

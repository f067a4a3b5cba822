use anyhow::{Context, Result};
use fleetload_config::{parse_run_time, LoadTestConfig};
use fleetload_core::{RunReport, Runner};
use fleetload_http::{HttpManager, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Apply `fleetload run` flags on top of the loaded configuration
pub fn apply_run_overrides(
    config: &mut LoadTestConfig,
    users: Option<usize>,
    run_time: Option<&str>,
    report: Option<&PathBuf>,
) -> Result<()> {
    if let Some(users) = users {
        config.run.users = users;
    }
    if let Some(run_time) = run_time {
        config.run.run_time = parse_run_time(run_time)
            .map_err(|e| anyhow::anyhow!("Invalid --run-time '{}': {}", run_time, e))?;
    }
    if let Some(report) = report {
        config.run.report_path = Some(report.clone());
    }
    config
        .validate_all()
        .context("Configuration invalid after applying command line overrides")?;
    Ok(())
}

pub async fn run_command(config: LoadTestConfig) -> Result<()> {
    info!(
        "Starting load test: {} users for {:?} against {}",
        config.run.users,
        config.run.run_time,
        config.api.api_root()
    );

    let transport: Arc<dyn Transport> = Arc::new(
        HttpManager::with_config(&config.http).context("Failed to create HTTP client")?,
    );
    let runner = Runner::from_config(config, transport).context("Failed to prepare the run")?;
    let report = runner.run().await.context("Load test aborted")?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    let total = &report.aggregated;
    if let Some(ref run) = report.run {
        println!("Run {} ({} users, {:.0}s)", run.run_id, run.users, run.duration_secs);
    }
    println!(
        "{:<45} {:>8} {:>8} {:>10} {:>10} {:>10}",
        "Endpoint", "Reqs", "Fails", "Avg(ms)", "p95(ms)", "req/s"
    );
    for (name, summary) in &report.endpoints {
        println!(
            "{:<45} {:>8} {:>8} {:>10.1} {:>10.1} {:>10.2}",
            name,
            summary.num_requests,
            summary.num_failures,
            summary.avg_response_time_ms,
            summary.p95,
            summary.requests_per_second
        );
    }
    println!(
        "{:<45} {:>8} {:>8} {:>10.1} {:>10.1} {:>10.2}",
        "Aggregated",
        total.num_requests,
        total.num_failures,
        total.avg_response_time_ms,
        total.p95,
        total.requests_per_second
    );
}

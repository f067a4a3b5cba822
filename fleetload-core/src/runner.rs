//! Spawns the workers and enforces the run deadline

use crate::distribution::EndpointDistribution;
use crate::error::Result;
use crate::scheduler::{Worker, WorkerContext};
use crate::stats::{RunMetadata, RunReport, StatsRecorder};
use crate::token::token_source_for;
use fleetload_config::LoadTestConfig;
use fleetload_http::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct Runner {
    context: WorkerContext,
    run_id: Uuid,
}

impl Runner {
    pub fn new(context: WorkerContext) -> Self {
        Self {
            context,
            run_id: Uuid::new_v4(),
        }
    }

    /// Build the shared context from configuration: endpoint table, token
    /// source and an empty statistics recorder
    pub fn from_config(config: LoadTestConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let distribution = EndpointDistribution::load(&config)?;
        let token_source = token_source_for(&config, transport.clone())?;
        Ok(Self::new(WorkerContext {
            config: Arc::new(config),
            distribution: Arc::new(distribution),
            stats: Arc::new(StatsRecorder::new()),
            transport,
            token_source,
        }))
    }

    /// Identifies this run in logs and in the report
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn stats(&self) -> Arc<StatsRecorder> {
        self.context.stats.clone()
    }

    /// Run every worker until the deadline and produce the report.
    ///
    /// A worker error that ends the run (bad token, undeletable resource)
    /// stops all other workers and is returned; other worker errors only
    /// stop that worker.
    pub async fn run(&self) -> Result<RunReport> {
        let run = &self.context.config.run;
        let started = Instant::now();
        let started_at = chrono::Utc::now();
        let deadline = started + run.run_time;
        let spawn_interval = if run.spawn_rate > 0.0 {
            Duration::from_secs_f64(1.0 / run.spawn_rate)
        } else {
            Duration::ZERO
        };

        info!(
            "Starting run {}: {} workers at {}/s for {:?}",
            self.run_id, run.users, run.spawn_rate, run.run_time
        );

        let mut workers = JoinSet::new();
        for index in 0..run.users {
            let context = self.context.clone();
            let spawn_at = started + spawn_interval.mul_f64(index as f64);
            workers.spawn(async move {
                sleep_until(spawn_at).await;
                let worker = Worker::new(index, &context).with_run_start(started);
                (index, drive(worker, deadline).await)
            });
        }

        let mut fatal = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, Ok(()))) => debug!("Worker {} finished", index),
                Ok((index, Err(e))) if e.aborts_run() => {
                    error!("Worker {} failed fatally: {}", index, e);
                    if fatal.is_none() {
                        workers.abort_all();
                        fatal = Some(e);
                    }
                }
                Ok((index, Err(e))) => warn!("Worker {} stopped: {}", index, e),
                Err(join_error) if join_error.is_cancelled() => {}
                Err(join_error) => error!("Worker task panicked: {}", join_error),
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let elapsed = started.elapsed();
        let report = self
            .context
            .stats
            .report(elapsed)
            .with_metadata(RunMetadata {
                run_id: self.run_id,
                started_at,
                duration_secs: elapsed.as_secs_f64(),
                users: run.users,
            });
        info!(
            "Run finished: {} requests, {} failures",
            report.aggregated.num_requests, report.aggregated.num_failures
        );
        if let Some(ref path) = run.report_path {
            report.write_to(path)?;
            info!("Report written to {}", path.display());
        }
        Ok(report)
    }
}

/// Run a worker until the deadline cuts it off
async fn drive(mut worker: Worker, deadline: Instant) -> Result<()> {
    let index = worker.index();
    match timeout_at(deadline, tick_forever(&mut worker)).await {
        Ok(result) => result,
        Err(_) => {
            debug!("Worker {} reached the run deadline", index);
            Ok(())
        }
    }
}

async fn tick_forever(worker: &mut Worker) -> Result<()> {
    let mut session = worker.on_start().await?;
    let think_time = worker.think_time();
    loop {
        worker.tick(&mut session).await?;
        if think_time.is_zero() {
            tokio::task::yield_now().await;
        } else {
            sleep(think_time).await;
        }
    }
}

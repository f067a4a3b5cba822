//! Request statistics shared by all workers, and the end-of-run report

use crate::error::Result;
use chrono::{DateTime, Utc};
use fleetload_http::HttpMethod;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Response times are kept as counts per rounded bucket so memory stays
/// flat however long the run is. Count, sum, min and max stay exact.
#[derive(Debug, Default, Clone)]
struct EndpointSamples {
    count: u64,
    failures: u64,
    total_ms: f64,
    min_ms: Option<f64>,
    max_ms: f64,
    /// Rounded milliseconds -> number of responses
    buckets: BTreeMap<u64, u64>,
}

/// Exact below 100 ms, then to 10 ms below 1 s, then to 100 ms
fn bucket_of(ms: f64) -> u64 {
    let ms = ms.round() as u64;
    match ms {
        0..=99 => ms,
        100..=999 => (ms + 5) / 10 * 10,
        _ => (ms + 50) / 100 * 100,
    }
}

impl EndpointSamples {
    fn add(&mut self, ms: f64, failed: bool) {
        self.count += 1;
        self.total_ms += ms;
        self.min_ms = Some(self.min_ms.map_or(ms, |min| min.min(ms)));
        self.max_ms = self.max_ms.max(ms);
        *self.buckets.entry(bucket_of(ms)).or_default() += 1;
        if failed {
            self.failures += 1;
        }
    }

    fn merge(&mut self, other: &EndpointSamples) {
        self.count += other.count;
        self.failures += other.failures;
        self.total_ms += other.total_ms;
        self.min_ms = match (self.min_ms, other.min_ms) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_ms = self.max_ms.max(other.max_ms);
        for (bucket, n) in &other.buckets {
            *self.buckets.entry(*bucket).or_default() += n;
        }
    }

    /// Nearest-rank percentile over the buckets
    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let rank = ((p / 100.0) * self.count as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bucket, n) in &self.buckets {
            seen += n;
            if seen >= rank {
                return *bucket as f64;
            }
        }
        self.max_ms
    }

    fn summarize(&self, run_duration: Duration) -> EndpointSummary {
        let count = self.count;
        let seconds = run_duration.as_secs_f64();

        EndpointSummary {
            num_requests: count,
            num_failures: self.failures,
            avg_response_time_ms: if count > 0 { self.total_ms / count as f64 } else { 0.0 },
            min_response_time_ms: self.min_ms.unwrap_or(0.0),
            max_response_time_ms: self.max_ms,
            p50: self.percentile(50.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
            requests_per_second: if seconds > 0.0 { count as f64 / seconds } else { 0.0 },
            failure_ratio: if count > 0 { self.failures as f64 / count as f64 } else { 0.0 },
        }
    }
}

/// Aggregated numbers for one endpoint, or for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub num_requests: u64,
    pub num_failures: u64,
    pub avg_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub requests_per_second: f64,
    pub failure_ratio: f64,
}

/// Which run a report belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunMetadata>,
    pub aggregated: EndpointSummary,
    /// Keyed by `"<METHOD> <name>"`
    pub endpoints: BTreeMap<String, EndpointSummary>,
}

impl RunReport {
    pub fn with_metadata(mut self, metadata: RunMetadata) -> Self {
        self.run = Some(metadata);
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Collects one sample per request from every worker
#[derive(Debug, Default)]
pub struct StatsRecorder {
    endpoints: Mutex<BTreeMap<String, EndpointSamples>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: HttpMethod, name: &str, elapsed: Duration, failed: bool) {
        let key = format!("{} {}", method, name);
        let mut endpoints = self.endpoints.lock();
        endpoints
            .entry(key)
            .or_default()
            .add(elapsed.as_nanos() as f64 / 1_000_000.0, failed);
    }

    pub fn total_requests(&self) -> u64 {
        self.endpoints
            .lock()
            .values()
            .map(|s| s.count)
            .sum()
    }

    pub fn report(&self, run_duration: Duration) -> RunReport {
        let endpoints = self.endpoints.lock();
        let mut aggregated = EndpointSamples::default();
        for samples in endpoints.values() {
            aggregated.merge(samples);
        }

        RunReport {
            run: None,
            aggregated: aggregated.summarize(run_duration),
            endpoints: endpoints
                .iter()
                .map(|(key, samples)| (key.clone(), samples.summarize(run_duration)))
                .collect(),
        }
    }
}

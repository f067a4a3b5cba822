//! Per-worker phase scheduler
//!
//! A [`Worker`] holds the collaborators (API client, token manager, helper
//! clients) and the read-only run configuration. Its mutable memory lives in
//! a [`SessionState`] that the caller owns and passes into every step, so a
//! worker's behaviour is fully determined by its configuration, the session
//! and the responses it sees.
//!
//! Requests inside one worker are strictly sequential.

use crate::api::ApiClient;
use crate::classifier::{classify_response, OperationKind, Outcome};
use crate::distribution::EndpointDistribution;
use crate::election::{local_identity, Coordinator};
use crate::error::{LoadTestError, Result};
use crate::persistence::{ConnectionConfig, PersistenceGateway};
use crate::phase::{Phase, PhaseThresholds};
use crate::session::{ServiceAccountCredentials, SessionState};
use crate::stats::StatsRecorder;
use crate::token::{TokenManager, TokenSource};
use crate::tracker::{ResourceHandle, ResourceKind};
use fleetload_config::LoadTestConfig;
use fleetload_http::{ApiRequest, Transport};
use fleetload_resilience::RetryPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Pause for ticks that have nothing to do
const IDLE_PAUSE: Duration = Duration::from_secs(1);

/// Rolls per tick before giving up on endpoints whose ids are unavailable
const PICK_ATTEMPTS: usize = 3;

const NAME_SUFFIX_LEN: usize = 8;
const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Server-side states of clusters that are already on their way out
const DELETING_STATES: &[&str] = &["deprovision", "deleting"];

/// Shared, read-only inputs every worker is built from
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<LoadTestConfig>,
    pub distribution: Arc<EndpointDistribution>,
    pub stats: Arc<StatsRecorder>,
    pub transport: Arc<dyn Transport>,
    pub token_source: Arc<dyn TokenSource>,
}

pub struct Worker {
    index: usize,
    identity: String,
    config: Arc<LoadTestConfig>,
    thresholds: PhaseThresholds,
    distribution: Arc<EndpointDistribution>,
    stats: Arc<StatsRecorder>,
    api: ApiClient,
    tokens: TokenManager,
    coordinator: Coordinator,
    persistence: Option<PersistenceGateway>,
    delete_policy: RetryPolicy,
    rng: StdRng,
    run_started: Option<Instant>,
}

impl Worker {
    pub fn new(index: usize, context: &WorkerContext) -> Self {
        let config = context.config.clone();
        let singular = config.api.resource_singular.as_str();

        let rng = match config.run.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_os_rng(),
        };

        let persistence = config.coordination.persist_results.then(|| {
            PersistenceGateway::new(context.transport.clone(), &config.coordination, singular)
        });

        Self {
            index,
            identity: local_identity(&config.coordination, index),
            thresholds: PhaseThresholds::from_config(&config.run, &config.workload),
            distribution: context.distribution.clone(),
            stats: context.stats.clone(),
            api: ApiClient::new(context.transport.clone(), &config.api),
            tokens: TokenManager::new(context.token_source.clone()),
            coordinator: Coordinator::new(context.transport.clone(), &config.coordination, singular),
            persistence,
            delete_policy: RetryPolicy::randomized_linear(config.workload.delete_max_attempts),
            rng,
            run_started: None,
            config,
        }
    }

    /// Measure phases from the start of the whole run rather than from this
    /// worker's start, so late-spawned workers still clean up in time
    pub fn with_run_start(mut self, started_at: Instant) -> Self {
        self.run_started = Some(started_at);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    pub fn think_time(&self) -> Duration {
        self.config.run.think_time()
    }

    /// Obtain a token and settle whether this worker may create clusters.
    ///
    /// The returned session's clock starts here unless a run start was given.
    pub async fn on_start(&mut self) -> Result<SessionState> {
        let started_at = self.run_started.unwrap_or_else(Instant::now);
        self.refresh_auth().await?;

        let workload = &self.config.workload;
        let creation_permitted = if !workload.creation_enabled() {
            false
        } else if workload.single_creator {
            self.coordinator.elect(&self.identity).await?
        } else {
            true
        };

        info!(
            "Worker {} ({}) started, creation permitted: {}",
            self.index, self.identity, creation_permitted
        );
        if !creation_permitted && self.distribution.endpoints().iter().any(|e| e.needs_cluster()) {
            info!(
                "Worker {}: creates no clusters, so endpoints needing a cluster id are skipped",
                self.index
            );
        }
        Ok(SessionState::new(started_at, creation_permitted))
    }

    /// Run one step of whichever phase is active and report which it was
    pub async fn tick(&mut self, session: &mut SessionState) -> Result<Phase> {
        self.refresh_auth().await?;

        let phase = self
            .thresholds
            .phase_at(session.elapsed(), session.seeding_done);
        match phase {
            Phase::Seeding => self.seed_step(session).await?,
            Phase::SteadyState => self.exercise_endpoints(session).await?,
            Phase::WindDown => self.wind_down(session).await?,
            Phase::Reconciliation => self.reconcile(session).await?,
        }
        Ok(phase)
    }

    /// Create one cluster and delete it straight away
    pub async fn seed_step(&mut self, session: &mut SessionState) -> Result<()> {
        if !session.creation_permitted() {
            debug!("Worker {}: not a creator, skipping seeding", self.index);
            session.seeding_done = true;
            return Ok(());
        }

        if session.seeds_created >= self.config.workload.seed_clusters_per_worker {
            let cooldown = self.config.workload.seed_cooldown;
            info!(
                "Worker {}: seeded {} clusters, waiting {:?} for deletions to drain",
                self.index, session.seeds_created, cooldown
            );
            sleep(cooldown).await;
            session.seeding_done = true;
            return Ok(());
        }

        let name = self.resource_name();
        if let Some(id) = self.create_cluster(session, &name).await? {
            session.seeds_created += 1;
            self.remove_resource(session, ResourceKind::Cluster, &id)
                .await?;
        }
        if session.throttled {
            info!("Worker {}: seeding stopped early, creation is throttled", self.index);
            session.seeding_done = true;
        }
        Ok(())
    }

    /// Steady-state traffic: create while the quota allows, otherwise poll
    /// readiness and send one weighted read
    pub async fn exercise_endpoints(&mut self, session: &mut SessionState) -> Result<()> {
        let hold_off = self.config.run.hold_off;
        let elapsed = session.elapsed();
        if elapsed < hold_off {
            sleep((hold_off - elapsed).min(IDLE_PAUSE)).await;
            return Ok(());
        }

        if self.may_create(session) {
            return self.create_primary(session).await;
        }

        self.poll_readiness(session).await?;
        self.dispatch_weighted(session).await
    }

    /// Delete tracked resources one per tick, clusters first
    pub async fn wind_down(&mut self, session: &mut SessionState) -> Result<()> {
        if !self.config.workload.cleanup_enabled() {
            return self.dispatch_weighted(session).await;
        }

        if !self.remove_next(session).await? {
            sleep(IDLE_PAUSE).await;
        }
        Ok(())
    }

    /// Sweep this run's resources the trackers lost track of.
    ///
    /// Best effort: failed listings are retried on the next tick and the run
    /// ends regardless.
    pub async fn reconcile(&mut self, session: &mut SessionState) -> Result<()> {
        if !self.config.workload.cleanup_enabled() {
            return self.dispatch_weighted(session).await;
        }

        if session.leftovers_cleared {
            sleep(IDLE_PAUSE).await;
            return Ok(());
        }

        if self.remove_next(session).await? {
            return Ok(());
        }

        match self.find_leftovers(session).await? {
            Some(0) => {
                info!("Worker {}: no leftover resources", self.index);
                session.leftovers_cleared = true;
            }
            Some(count) => {
                info!("Worker {}: queued {} leftover resources for deletion", self.index, count)
            }
            None => debug!("Worker {}: leftover listing failed, retrying", self.index),
        }
        Ok(())
    }

    /// Delete a tracked resource, retrying until the server confirms it is
    /// gone. Untracked ids are ignored.
    pub async fn remove_resource(
        &mut self,
        session: &mut SessionState,
        kind: ResourceKind,
        id: &str,
    ) -> Result<()> {
        if !session.tracker(kind).contains(id) {
            debug!("{} {} is not tracked, nothing to delete", kind, id);
            return Ok(());
        }

        let mut attempt = 1;
        loop {
            let (request, name) = match kind {
                ResourceKind::Cluster => (
                    self.api.delete_cluster_request(id),
                    format!("/{}/[id]", self.api.resource()),
                ),
                ResourceKind::ServiceAccount => (
                    self.api.delete_service_account_request(id),
                    "/service_accounts/[id]".to_string(),
                ),
            };

            let outcome = self.call(&name, OperationKind::Delete, request).await?;
            if outcome.is_confirmed() {
                session.tracker_mut(kind).remove_if_present(id);
                match kind {
                    ResourceKind::Cluster => {
                        session.persisted_configs.remove(id);
                    }
                    ResourceKind::ServiceAccount => {
                        session.credentials.remove(id);
                    }
                }
                info!("Deleted {} {} after {} attempt(s)", kind, id, attempt);
                return Ok(());
            }

            if !self.delete_policy.allows_another(attempt) {
                error!(
                    "Giving up on {} {} after {} attempts; manual cleanup required",
                    kind, id, attempt
                );
                return Err(LoadTestError::ManualCleanupRequired {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    attempts: attempt,
                });
            }

            let delay = self.delete_policy.delay_for_attempt(attempt);
            debug!(
                "Delete of {} {} not confirmed ({:?}), retrying in {:?}",
                kind, id, outcome, delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Send one GET picked from the weighted distribution
    pub async fn dispatch_weighted(&mut self, session: &SessionState) -> Result<()> {
        for _ in 0..PICK_ATTEMPTS {
            let Some(endpoint) = self.distribution.choose(&mut self.rng).cloned() else {
                continue;
            };
            let cluster_id = session
                .clusters
                .random_pick(&mut self.rng)
                .map(|h| h.id.clone());
            let service_account_id = session
                .service_accounts
                .random_pick(&mut self.rng)
                .map(|h| h.id.clone());

            let Some(path) = endpoint.resolve(cluster_id.as_deref(), service_account_id.as_deref())
            else {
                continue;
            };

            let request = self.api.get_request(&path);
            self.call(&endpoint.name, OperationKind::Read, request)
                .await?;
            return Ok(());
        }
        Ok(())
    }

    fn may_create(&self, session: &SessionState) -> bool {
        let workload = &self.config.workload;
        workload.creation_enabled()
            && session.creation_permitted()
            && !session.throttled
            && session.clusters_created < workload.clusters_per_worker
    }

    /// Create a cluster with its service account and persist both ids
    async fn create_primary(&mut self, session: &mut SessionState) -> Result<()> {
        let name = self.resource_name();

        if let Some(cluster_id) = self.create_cluster(session, &name).await? {
            session.clusters_created += 1;
            if let Some(ref gateway) = self.persistence {
                gateway.persist_cluster_id(&cluster_id).await?;
            }

            if let Some(sa_id) = self.create_service_account(session, &name).await? {
                session.clusters.set_service_account(&cluster_id, &sa_id);
                if let Some(ref gateway) = self.persistence {
                    gateway.persist_service_account_id(&sa_id).await?;
                }
            }
        }

        sleep(self.config.workload.inter_creation_delay).await;
        Ok(())
    }

    async fn create_cluster(&mut self, session: &mut SessionState, name: &str) -> Result<Option<String>> {
        let workload = &self.config.workload;
        let body = json!({
            "name": name,
            "cloud_provider": workload.cloud_provider,
            "region": workload.region,
            "multi_az": workload.multi_az,
        });
        let request = self.api.create_cluster_request(body);
        let stat_name = format!("/{}", self.api.resource());

        match self.call(&stat_name, OperationKind::Create, request).await? {
            Outcome::Created { id: Some(id), .. } => {
                session
                    .clusters
                    .add(ResourceHandle::new(id.clone(), ResourceKind::Cluster));
                info!("Worker {} created cluster {} ({})", self.index, id, name);
                Ok(Some(id))
            }
            Outcome::Throttled => {
                warn!(
                    "Worker {}: cluster creation throttled, no further creates",
                    self.index
                );
                session.throttled = true;
                Ok(None)
            }
            Outcome::Duplicate => {
                debug!("Cluster name {} already taken", name);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn create_service_account(
        &mut self,
        session: &mut SessionState,
        name: &str,
    ) -> Result<Option<String>> {
        let body = json!({
            "name": name,
            "description": self.config.workload.service_account_marker,
        });
        let request = self.api.create_service_account_request(body);

        match self
            .call("/service_accounts", OperationKind::Create, request)
            .await?
        {
            Outcome::Created { id: Some(id), body } => {
                session.service_accounts.add(ResourceHandle::new(
                    id.clone(),
                    ResourceKind::ServiceAccount,
                ));
                if let Some(credentials) = body.as_ref().and_then(credentials_from) {
                    session.credentials.insert(id.clone(), credentials);
                }
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }

    /// Check one not-yet-persisted cluster and persist its connection config
    /// the first time it reports ready
    async fn poll_readiness(&mut self, session: &mut SessionState) -> Result<()> {
        let pending = session.pending_clusters();
        if pending.is_empty() {
            return Ok(());
        }
        let handle = pending[self.rng.random_range(0..pending.len())].clone();

        let request = self.api.get_cluster_request(&handle.id);
        let name = format!("/{}/[id]", self.api.resource());
        let body = match self.call(&name, OperationKind::Read, request).await? {
            Outcome::Body(Some(body)) => body,
            Outcome::Empty => {
                warn!("Cluster {} no longer exists, dropping it", handle.id);
                session.clusters.remove_if_present(&handle.id);
                return Ok(());
            }
            _ => return Ok(()),
        };

        if body.get("status").and_then(Value::as_str) != Some("ready") {
            return Ok(());
        }
        let Some(bootstrap) = body.get("bootstrap_server_host").and_then(Value::as_str) else {
            return Ok(());
        };
        let Some(credentials) = handle
            .service_account
            .as_ref()
            .and_then(|sa| session.credentials.get(sa))
        else {
            return Ok(());
        };

        let config = ConnectionConfig {
            bootstrap_url: bootstrap.to_string(),
            username: credentials.client_id.clone(),
            password: credentials.client_secret.clone(),
        };
        if let Some(ref gateway) = self.persistence {
            gateway.persist_connection_config(&config).await?;
        }
        session.persisted_configs.insert(handle.id.clone());
        info!("Cluster {} is ready at {}", handle.id, bootstrap);
        Ok(())
    }

    /// Delete the oldest tracked resource; false when nothing is tracked
    async fn remove_next(&mut self, session: &mut SessionState) -> Result<bool> {
        let next = session
            .clusters
            .first()
            .map(|h| (ResourceKind::Cluster, h.id.clone()))
            .or_else(|| {
                session
                    .service_accounts
                    .first()
                    .map(|h| (ResourceKind::ServiceAccount, h.id.clone()))
            });

        match next {
            Some((kind, id)) => {
                self.remove_resource(session, kind, &id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// List live resources, track the ones belonging to this run and return
    /// how many were added; `None` when a listing failed
    async fn find_leftovers(&mut self, session: &mut SessionState) -> Result<Option<usize>> {
        let request = self.api.list_clusters_request();
        let name = format!("/{}", self.api.resource());
        let Outcome::Body(Some(clusters)) = self.call(&name, OperationKind::Read, request).await?
        else {
            return Ok(None);
        };

        let request = self.api.list_service_accounts_request();
        let Outcome::Body(Some(service_accounts)) = self
            .call("/service_accounts", OperationKind::Read, request)
            .await?
        else {
            return Ok(None);
        };

        let workload = &self.config.workload;
        let prefix = format!("{}-", workload.name_prefix);
        let mut added = 0;

        for item in items(&clusters) {
            let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
            let status = item.get("status").and_then(Value::as_str).unwrap_or_default();
            if !name.starts_with(&prefix) || DELETING_STATES.contains(&status) {
                continue;
            }
            if let Some(id) = item.get("id").and_then(Value::as_str) {
                if session
                    .clusters
                    .add(ResourceHandle::new(id, ResourceKind::Cluster))
                {
                    added += 1;
                }
            }
        }

        for item in items(&service_accounts) {
            let description = item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !description.contains(workload.service_account_marker.as_str()) {
                continue;
            }
            if let Some(id) = item.get("id").and_then(Value::as_str) {
                if session
                    .service_accounts
                    .add(ResourceHandle::new(id, ResourceKind::ServiceAccount))
                {
                    added += 1;
                }
            }
        }

        Ok(Some(added))
    }

    /// Send a request, record it, and refresh the token on a 401
    async fn call(&mut self, name: &str, kind: OperationKind, request: ApiRequest) -> Result<Outcome> {
        let method = request.method;
        let started = Instant::now();

        let outcome = match self.api.send(request).await {
            Ok(response) => {
                let outcome = classify_response(kind, &response);
                self.stats
                    .record(method, name, response.elapsed, outcome.counts_as_failure());
                outcome
            }
            Err(e) => {
                warn!("{} {} failed: {}", method, name, e);
                self.stats.record(method, name, started.elapsed(), true);
                Outcome::Failed {
                    status: 0,
                    reason: Some(e.to_string()),
                }
            }
        };

        match outcome {
            Outcome::AuthRetry => {
                warn!("Worker {}: token rejected, refreshing", self.index);
                self.tokens.invalidate();
                self.refresh_auth().await?;
            }
            Outcome::Failed { status, ref reason } => {
                debug!("{} {} -> {} {:?}", method, name, status, reason);
            }
            _ => {}
        }
        Ok(outcome)
    }

    async fn refresh_auth(&mut self) -> Result<()> {
        let token = self.tokens.ensure_valid_token().await?.to_string();
        self.api
            .set_default_header("Authorization", format!("Bearer {}", token));
        Ok(())
    }

    /// `<prefix>-<random suffix>`, within the API's 32 character name limit
    fn resource_name(&mut self) -> String {
        let suffix: String = (0..NAME_SUFFIX_LEN)
            .map(|_| NAME_ALPHABET[self.rng.random_range(0..NAME_ALPHABET.len())] as char)
            .collect();
        format!("{}-{}", self.config.workload.name_prefix, suffix)
    }
}

fn items(list: &Value) -> impl Iterator<Item = &Value> {
    list.get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Client credentials from a service-account create response; both the
/// snake_case and camelCase spellings appear across API versions
fn credentials_from(body: &Value) -> Option<ServiceAccountCredentials> {
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| body.get(*name).and_then(Value::as_str))
            .map(str::to_string)
    };
    Some(ServiceAccountCredentials {
        client_id: field(&["client_id", "clientID"])?,
        client_secret: field(&["client_secret", "clientSecret"])?,
    })
}

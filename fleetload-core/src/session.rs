//! Per-worker mutable state

use crate::tracker::{ResourceHandle, ResourceKind, ResourceTracker};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Client credentials returned when a service account is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Everything one worker remembers between ticks.
///
/// Owned by the worker's task and passed by `&mut` into each scheduler step.
#[derive(Debug)]
pub struct SessionState {
    pub clusters: ResourceTracker,
    pub service_accounts: ResourceTracker,
    /// Keyed by service account id
    pub credentials: HashMap<String, ServiceAccountCredentials>,
    pub clusters_created: u32,
    pub seeds_created: u32,
    pub throttled: bool,
    pub seeding_done: bool,
    /// Clusters whose connection config has been persisted
    pub persisted_configs: HashSet<String>,
    pub leftovers_cleared: bool,
    creation_permitted: bool,
    started_at: Instant,
}

impl SessionState {
    /// `creation_permitted` is fixed for the worker's lifetime
    pub fn new(started_at: Instant, creation_permitted: bool) -> Self {
        Self {
            clusters: ResourceTracker::new(ResourceKind::Cluster),
            service_accounts: ResourceTracker::new(ResourceKind::ServiceAccount),
            credentials: HashMap::new(),
            clusters_created: 0,
            seeds_created: 0,
            throttled: false,
            seeding_done: false,
            persisted_configs: HashSet::new(),
            leftovers_cleared: false,
            creation_permitted,
            started_at,
        }
    }

    pub fn creation_permitted(&self) -> bool {
        self.creation_permitted
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn tracker(&self, kind: ResourceKind) -> &ResourceTracker {
        match kind {
            ResourceKind::Cluster => &self.clusters,
            ResourceKind::ServiceAccount => &self.service_accounts,
        }
    }

    pub fn tracker_mut(&mut self, kind: ResourceKind) -> &mut ResourceTracker {
        match kind {
            ResourceKind::Cluster => &mut self.clusters,
            ResourceKind::ServiceAccount => &mut self.service_accounts,
        }
    }

    /// Clusters that have a credentialed service account but no persisted
    /// connection config yet
    pub fn pending_clusters(&self) -> Vec<&ResourceHandle> {
        self.clusters.handles().iter().filter(|handle| {
            !self.persisted_configs.contains(&handle.id)
                && handle
                    .service_account
                    .as_ref()
                    .is_some_and(|sa| self.credentials.contains_key(sa))
        })
        .collect()
    }

    /// Whether any resource is still tracked
    pub fn has_tracked_resources(&self) -> bool {
        !self.clusters.is_empty() || !self.service_accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pending_cluster_requires_credentials() {
        let mut session = SessionState::new(Instant::now(), true);
        session.clusters.add(ResourceHandle::new("c1", ResourceKind::Cluster));
        session.clusters.add(ResourceHandle::new("c2", ResourceKind::Cluster));
        assert!(session.pending_clusters().is_empty());

        session.clusters.set_service_account("c2", "sa2");
        session.credentials.insert(
            "sa2".into(),
            ServiceAccountCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );
        let pending: Vec<&str> = session.pending_clusters().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(pending, vec!["c2"]);

        session.persisted_configs.insert("c2".into());
        assert!(session.pending_clusters().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_follows_clock() {
        let session = SessionState::new(Instant::now(), false);
        tokio::time::advance(Duration::from_secs(42)).await;
        assert_eq!(session.elapsed(), Duration::from_secs(42));
        assert!(!session.creation_permitted());
    }
}

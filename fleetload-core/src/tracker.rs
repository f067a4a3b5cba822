//! Per-worker registry of created resources

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cluster,
    ServiceAccount,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Cluster => write!(f, "cluster"),
            ResourceKind::ServiceAccount => write!(f, "service account"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: String,
    pub kind: ResourceKind,
    /// Service account created alongside a cluster
    pub service_account: Option<String>,
}

impl ResourceHandle {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            service_account: None,
        }
    }
}

/// Resources of one kind this worker believes exist server-side.
///
/// An id is held at most once. Insertion order is kept so cleanup proceeds
/// oldest first.
#[derive(Debug, Clone)]
pub struct ResourceTracker {
    kind: ResourceKind,
    handles: Vec<ResourceHandle>,
}

impl ResourceTracker {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            handles: Vec::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Track a handle; returns false if the id was already tracked
    pub fn add(&mut self, handle: ResourceHandle) -> bool {
        if self.contains(&handle.id) {
            return false;
        }
        self.handles.push(handle);
        true
    }

    /// Stop tracking `id`; absent ids are ignored
    pub fn remove_if_present(&mut self, id: &str) -> Option<ResourceHandle> {
        let position = self.handles.iter().position(|h| h.id == id)?;
        Some(self.handles.remove(position))
    }

    /// Uniformly random handle, `None` only when empty
    pub fn random_pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ResourceHandle> {
        if self.handles.is_empty() {
            return None;
        }
        self.handles.get(rng.random_range(0..self.handles.len()))
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ResourceHandle> {
        self.handles.iter().find(|h| h.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> Option<&ResourceHandle> {
        self.handles.first()
    }

    pub fn ids(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.id.clone()).collect()
    }

    pub fn handles(&self) -> &[ResourceHandle] {
        &self.handles
    }

    /// Record the service account created for a cluster
    pub fn set_service_account(&mut self, cluster_id: &str, service_account_id: &str) -> bool {
        match self.handles.iter_mut().find(|h| h.id == cluster_id) {
            Some(handle) => {
                handle.service_account = Some(service_account_id.to_string());
                true
            }
            None => false,
        }
    }
}

//! Shared state behind the helper routes

use fleetload_core::{TokenManager, TokenSource};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::store::FileStore;

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct HelperState {
    pub store: Arc<FileStore>,
    elected: Arc<Mutex<Option<String>>>,
    tokens: Option<Arc<tokio::sync::Mutex<TokenManager>>>,
}

impl HelperState {
    pub fn new(store: FileStore, token_source: Option<Arc<dyn TokenSource>>) -> Self {
        Self {
            store: Arc::new(store),
            elected: Arc::new(Mutex::new(None)),
            tokens: token_source.map(|source| Arc::new(tokio::sync::Mutex::new(TokenManager::new(source)))),
        }
    }

    /// Record `candidate` as the creator unless one is already stored.
    /// Empty candidates never win. Returns the stored creator.
    pub fn elect(&self, candidate: &str) -> Option<String> {
        let mut elected = self.elected.lock();
        if elected.is_none() && !candidate.is_empty() {
            *elected = Some(candidate.to_string());
        }
        elected.clone()
    }

    pub fn elected(&self) -> Option<String> {
        self.elected.lock().clone()
    }

    pub fn tokens(&self) -> Option<&Arc<tokio::sync::Mutex<TokenManager>>> {
        self.tokens.as_ref()
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{ProxyServiceError, ProxyTransactionService};

#[derive(Default)]
struct State {
    hashes: HashMap<String, String>,
    failing: bool,
    lookups: Vec<String>,
}

/// Proxy service answering from a fixed hash table.
#[derive(Clone, Default)]
pub struct MockProxyService {
    state: Arc<Mutex<State>>,
}

impl MockProxyService {
    pub fn with_hash(self, proxy_hash: &str, chain_hash: &str) -> Self {
        self.lock_state()
            .hashes
            .insert(proxy_hash.to_string(), chain_hash.to_string());
        self
    }

    /// Every subsequent lookup fails with an HTTP 503.
    pub fn fail_lookups(&self) {
        self.lock_state().failing = true;
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lock_state().lookups.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProxyTransactionService for MockProxyService {
    async fn chain_hash(&self, proxy_hash: &str) -> Result<Option<String>, ProxyServiceError> {
        let mut state = self.lock_state();
        state.lookups.push(proxy_hash.to_string());
        if state.failing {
            return Err(ProxyServiceError::HttpStatus(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(state.hashes.get(proxy_hash).cloned())
    }
}

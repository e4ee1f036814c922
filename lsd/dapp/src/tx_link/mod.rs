//! Explorer links for submitted transactions, including proxy (Safe)
//! transactions whose on-chain hash differs from the submitted one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lsd_dapp_interface::{Account, TxHash};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ChainConfig, ProxyConfig};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockProxyService;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplorerLinks {
    base: String,
}

impl ExplorerLinks {
    pub fn new(explorer_url: impl Into<String>) -> Self {
        let mut base = explorer_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    pub fn from_chain(chain: &ChainConfig) -> Self {
        Self::new(chain.explorer_url.clone())
    }

    pub fn tx_link(&self, hash: &str) -> String {
        format!("{}/tx/{hash}", self.base)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyServiceError {
    #[error("invalid transaction service endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("transaction service transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("transaction service transport error: HTTP status {0}")]
    HttpStatus(StatusCode),
}

/// Maps a proxy transaction hash to the hash of the transaction that
/// executed it on chain. `None` while the proxy transaction is pending.
#[async_trait]
pub trait ProxyTransactionService: Send + Sync {
    async fn chain_hash(&self, proxy_hash: &str) -> Result<Option<String>, ProxyServiceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultisigTransaction {
    #[serde(default)]
    transaction_hash: Option<String>,
}

/// Safe transaction service over HTTP.
#[derive(Clone)]
pub struct SafeTransactionServiceClient {
    inner: Client,
    base: String,
}

impl SafeTransactionServiceClient {
    pub fn new(service_url: &str, timeout: Duration) -> Result<Self, ProxyServiceError> {
        Url::parse(service_url)
            .map_err(|err| ProxyServiceError::InvalidEndpoint(err.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: client,
            base: service_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProxyServiceError> {
        Self::new(&config.tx_service_url, config.timeout())
    }

    pub fn transaction_url(&self, proxy_hash: &str) -> Result<Url, ProxyServiceError> {
        let raw = format!("{}/api/v1/multisig-transactions/{proxy_hash}/", self.base);
        Url::parse(&raw).map_err(|err| ProxyServiceError::InvalidEndpoint(err.to_string()))
    }
}

#[async_trait]
impl ProxyTransactionService for SafeTransactionServiceClient {
    async fn chain_hash(&self, proxy_hash: &str) -> Result<Option<String>, ProxyServiceError> {
        let url = self.transaction_url(proxy_hash)?;
        let response = self.inner.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProxyServiceError::HttpStatus(response.status()));
        }
        let transaction: MultisigTransaction = response.json().await?;
        Ok(transaction
            .transaction_hash
            .filter(|hash| !hash.is_empty()))
    }
}

/// Builds explorer links for whatever account submitted a transaction.
#[derive(Clone)]
pub struct TransactionLinkResolver {
    links: ExplorerLinks,
    proxy: Arc<dyn ProxyTransactionService>,
}

impl TransactionLinkResolver {
    pub fn new(links: ExplorerLinks, proxy: Arc<dyn ProxyTransactionService>) -> Self {
        Self { links, proxy }
    }

    pub fn links(&self) -> &ExplorerLinks {
        &self.links
    }

    /// Explorer link for `hash`. Lookup failures for proxy accounts are
    /// logged and yield `None`.
    pub async fn resolve(&self, account: &Account, hash: &TxHash) -> Option<String> {
        if !account.is_proxy_account {
            return Some(self.links.tx_link(hash.as_str()));
        }
        match self.proxy.chain_hash(hash.as_str()).await {
            Ok(Some(chain_hash)) => Some(self.links.tx_link(&chain_hash)),
            Ok(None) => {
                debug!(proxy_hash = %hash, "proxy transaction not executed yet");
                None
            }
            Err(err) => {
                warn!(proxy_hash = %hash, error = %err, "proxy transaction lookup failed");
                None
            }
        }
    }
}

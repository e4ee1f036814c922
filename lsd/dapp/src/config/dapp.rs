use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lsd_dapp_interface::{parse_ether, UnitError, Wei};
use serde::{Deserialize, Serialize};

const DEFAULT_NETWORK_ID: u64 = 5;
const DEFAULT_EXPLORER_URL: &str = "https://goerli.etherscan.io";
const DEFAULT_DAPP_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/bsn-eng/liquid-staking-derivative";
const DEFAULT_LSD_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/bsn-eng/stakehouse-protocol-goerli";
const DEFAULT_TX_SERVICE_URL: &str = "https://safe-transaction-goerli.safe.global";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const MIN_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_NODE_RUNNER_BOND: &str = "4.0";
const DEFAULT_MAX_GAS_FEE: &str = "0.02";
const DEFAULT_MIN_AMOUNT: &str = "0.001";

/// Environment variable overriding [`TelemetryConfig::opt_in`].
pub const TELEMETRY_OPT_IN_ENV: &str = "LSD_DAPP_TELEMETRY_OPT_IN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to access dapp configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dapp configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unable to encode dapp configuration: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid dapp configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for the dApp core.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DappConfig {
    pub chain: ChainConfig,
    pub subgraph: SubgraphConfig,
    pub proxy: ProxyConfig,
    pub staking: StakingConfig,
    pub telemetry: TelemetryConfig,
}

impl DappConfig {
    /// Reads and sanitizes a TOML configuration file, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DappConfig = toml::from_str(&content)?;
        let mut config = config.sanitized();
        config.validate()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads `path` when it exists and falls back to defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let encoded = toml::to_string_pretty(&self.clone().sanitized())?;
        fs::write(path, encoded).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns a copy with out-of-range values clamped.
    pub fn sanitized(mut self) -> Self {
        self.subgraph.timeout_ms = self.subgraph.timeout_ms.max(MIN_TIMEOUT_MS);
        self.proxy.timeout_ms = self.proxy.timeout_ms.max(MIN_TIMEOUT_MS);
        if self.chain.supported_chain_ids.is_empty() {
            self.chain.supported_chain_ids = vec![self.chain.network_id];
        }
        self.chain.explorer_url = self.chain.explorer_url.trim_end_matches('/').to_string();
        self.proxy.tx_service_url = self.proxy.tx_service_url.trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.chain.supported_chain_ids.contains(&self.chain.network_id) {
            return Err(ConfigError::Invalid(format!(
                "chain.network_id {} is not listed in chain.supported_chain_ids",
                self.chain.network_id
            )));
        }
        if self.subgraph.dapp_endpoint.trim().is_empty()
            || self.subgraph.lsd_endpoint.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "subgraph endpoints must not be empty".into(),
            ));
        }
        for (field, value) in [
            ("staking.node_runner_bond", &self.staking.node_runner_bond),
            ("staking.max_gas_fee", &self.staking.max_gas_fee),
            ("staking.min_amount", &self.staking.min_amount),
        ] {
            parse_ether(value)
                .map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))?;
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(enabled) = env::var(TELEMETRY_OPT_IN_ENV)
            .ok()
            .as_deref()
            .and_then(parse_bool)
        {
            self.telemetry.opt_in = enabled;
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Chain selection and explorer settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain the SDK is built for; the SDK is unavailable on any other chain.
    pub network_id: u64,
    /// Chains the wallet connectors may use. The first entry is the switch target.
    pub supported_chain_ids: Vec<u64>,
    /// Block explorer base URL used for transaction links.
    pub explorer_url: String,
    /// Optional JSON-RPC URLs handed to wallet connectors, keyed by chain id.
    pub rpc_urls: Vec<ChainRpcUrl>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network_id: DEFAULT_NETWORK_ID,
            supported_chain_ids: vec![DEFAULT_NETWORK_ID],
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            rpc_urls: Vec::new(),
        }
    }
}

impl ChainConfig {
    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.supported_chain_ids.contains(&chain_id)
    }

    pub fn rpc_url(&self, chain_id: u64) -> Option<&str> {
        self.rpc_urls
            .iter()
            .find(|entry| entry.chain_id == chain_id)
            .map(|entry| entry.url.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainRpcUrl {
    pub chain_id: u64,
    pub url: String,
}

/// GraphQL endpoints and split-routing rules.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubgraphConfig {
    /// Endpoint serving the operations listed in `dapp_operations`.
    pub dapp_endpoint: String,
    /// Endpoint serving every other operation.
    pub lsd_endpoint: String,
    /// Operation names routed to `dapp_endpoint`.
    pub dapp_operations: Vec<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            dapp_endpoint: DEFAULT_DAPP_SUBGRAPH.to_string(),
            lsd_endpoint: DEFAULT_LSD_SUBGRAPH.to_string(),
            dapp_operations: vec!["Validators".to_string()],
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl SubgraphConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Multisig proxy transaction service settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    pub tx_service_url: String,
    pub timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            tx_service_url: DEFAULT_TX_SERVICE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Staking constants. Amounts are decimal ether strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StakingConfig {
    /// Withdrawal credentials every deposit file must carry.
    pub withdrawal_credentials: String,
    pub node_runner_bond: String,
    /// Headroom kept in the wallet on top of the bond for gas.
    pub max_gas_fee: String,
    /// Smallest accepted deposit or withdrawal.
    pub min_amount: String,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            withdrawal_credentials: String::new(),
            node_runner_bond: DEFAULT_NODE_RUNNER_BOND.to_string(),
            max_gas_fee: DEFAULT_MAX_GAS_FEE.to_string(),
            min_amount: DEFAULT_MIN_AMOUNT.to_string(),
        }
    }
}

impl StakingConfig {
    pub fn node_runner_bond(&self) -> Result<Wei, UnitError> {
        parse_ether(&self.node_runner_bond)
    }

    pub fn max_gas_fee(&self) -> Result<Wei, UnitError> {
        parse_ether(&self.max_gas_fee)
    }

    pub fn min_amount(&self) -> Result<Wei, UnitError> {
        parse_ether(&self.min_amount)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    pub opt_in: bool,
}

pub mod dapp;

pub use dapp::{
    ChainConfig, ChainRpcUrl, ConfigError, DappConfig, ProxyConfig, StakingConfig, SubgraphConfig,
    TelemetryConfig, TELEMETRY_OPT_IN_ENV,
};

//! Collaborators shared by every workflow.

use std::sync::Arc;

use lsd_dapp_interface::{UnitError, Wei};

use crate::config::{DappConfig, StakingConfig};
use crate::subgraph::{SubgraphClient, SubgraphClientError, SubgraphReader};
use crate::telemetry::DappTelemetry;
use crate::tx_link::{
    ExplorerLinks, ProxyServiceError, ProxyTransactionService, SafeTransactionServiceClient,
    TransactionLinkResolver,
};

#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error(transparent)]
    Subgraph(#[from] SubgraphClientError),
    #[error(transparent)]
    Proxy(#[from] ProxyServiceError),
    #[error("invalid staking amount: {0}")]
    Amount(#[from] UnitError),
}

/// Staking amounts resolved from configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingLimits {
    pub withdrawal_credentials: String,
    pub node_runner_bond: Wei,
    pub max_gas_fee: Wei,
    pub min_amount: Wei,
}

impl StakingLimits {
    pub fn from_config(config: &StakingConfig) -> Result<Self, UnitError> {
        Ok(Self {
            withdrawal_credentials: config.withdrawal_credentials.clone(),
            node_runner_bond: config.node_runner_bond()?,
            max_gas_fee: config.max_gas_fee()?,
            min_amount: config.min_amount()?,
        })
    }
}

#[derive(Clone)]
pub struct DappServices {
    pub subgraph: Arc<dyn SubgraphReader>,
    pub links: TransactionLinkResolver,
    pub telemetry: DappTelemetry,
    pub limits: StakingLimits,
}

impl DappServices {
    pub fn new(
        config: &DappConfig,
        subgraph: Arc<dyn SubgraphReader>,
        proxy: Arc<dyn ProxyTransactionService>,
    ) -> Result<Self, ServicesError> {
        Ok(Self {
            subgraph,
            links: TransactionLinkResolver::new(ExplorerLinks::from_chain(&config.chain), proxy),
            telemetry: DappTelemetry::from_config(&config.telemetry),
            limits: StakingLimits::from_config(&config.staking)?,
        })
    }

    /// Wires the HTTP-backed subgraph and Safe transaction service clients.
    pub fn from_config(config: &DappConfig) -> Result<Self, ServicesError> {
        let subgraph = SubgraphClient::from_config(&config.subgraph)?;
        let proxy = SafeTransactionServiceClient::from_config(&config.proxy)?;
        Self::new(config, Arc::new(subgraph), Arc::new(proxy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::StaticSubgraph;
    use crate::tx_link::MockProxyService;

    #[test]
    fn limits_follow_the_staking_section() {
        let config = DappConfig::default();
        let services = DappServices::new(
            &config,
            Arc::new(StaticSubgraph::default()),
            Arc::new(MockProxyService::default()),
        )
        .unwrap();
        assert_eq!(services.limits.node_runner_bond, Wei::from_ether(4));
        assert_eq!(services.limits.min_amount, Wei(1_000_000_000_000_000));
        assert!(!services.telemetry.opted_in());
    }

    #[test]
    fn malformed_amounts_are_rejected() {
        let mut config = DappConfig::default();
        config.staking.max_gas_fee = "lots".into();
        let err = DappServices::new(
            &config,
            Arc::new(StaticSubgraph::default()),
            Arc::new(MockProxyService::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ServicesError::Amount(_)));
    }
}

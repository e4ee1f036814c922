//! Figures derived from several subgraph queries.

use std::collections::BTreeMap;

use lsd_dapp_interface::{Address, BlsPublicKey, NetworkRecord, ValidatorStatus, Wei, NODE_RUNNER_BOND};
use serde::{Deserialize, Serialize};

use super::{SubgraphClientError, SubgraphReader};

/// Where the "available to stake" figure comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeSource {
    /// Both giant pools combined.
    Main,
    Staking,
    FeesMev,
    /// Bonds of the account's validators that are ready to stake.
    NodeRunner,
}

/// ETH available to stake for `source`. Missing pools count as zero, as does
/// the node-runner source without an account.
pub async fn available_to_stake(
    reader: &dyn SubgraphReader,
    source: StakeSource,
    account: Option<&str>,
) -> Result<Wei, SubgraphClientError> {
    match source {
        StakeSource::Main => {
            let sav_eth = first_pool_balance(reader.giant_sav_eth_pools().await?);
            let fees = first_pool_balance(reader.giant_fees_and_mev_pools().await?);
            Ok(sav_eth.saturating_add(fees))
        }
        StakeSource::Staking => Ok(first_pool_balance(reader.giant_sav_eth_pools().await?)),
        StakeSource::FeesMev => Ok(first_pool_balance(reader.giant_fees_and_mev_pools().await?)),
        StakeSource::NodeRunner => {
            let Some(account) = account else {
                return Ok(Wei::ZERO);
            };
            let ready = reader
                .node_runner_validators_by_status(account, &ValidatorStatus::ReadyToStake)
                .await?;
            Ok(NODE_RUNNER_BOND.saturating_mul(ready.len() as u64))
        }
    }
}

fn first_pool_balance(pools: Vec<super::GiantPool>) -> Wei {
    pools
        .into_iter()
        .next()
        .map(|pool| pool.available_to_stake)
        .unwrap_or(Wei::ZERO)
}

/// Node operator bonds held by an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOperatorPositions {
    pub count: u64,
    pub validators: Vec<BlsPublicKey>,
    /// Bonded ETH per liquid staking manager. Every known network has an entry.
    pub lsd_network_balance: BTreeMap<Address, Wei>,
}

impl NodeOperatorPositions {
    /// Total bonded ETH across networks.
    pub fn total(&self) -> Wei {
        NODE_RUNNER_BOND.saturating_mul(self.count)
    }

    pub fn balance_for(&self, network: &str) -> Wei {
        self.lsd_network_balance
            .iter()
            .find(|(manager, _)| manager.eq_ignore_ascii_case(network))
            .map(|(_, balance)| *balance)
            .unwrap_or(Wei::ZERO)
    }
}

/// Counts the account's non-withdrawn validators and credits each node
/// runner's bonds to the first network it joined.
pub async fn node_operator_positions(
    reader: &dyn SubgraphReader,
    account: &str,
    networks: &[NetworkRecord],
) -> Result<NodeOperatorPositions, SubgraphClientError> {
    let mut positions = NodeOperatorPositions {
        lsd_network_balance: networks
            .iter()
            .map(|network| (network.liquid_staking_manager.clone(), Wei::ZERO))
            .collect(),
        ..NodeOperatorPositions::default()
    };

    for runner in reader.node_runners(account).await? {
        let bonded = runner.validators.len() as u64;
        positions.count += bonded;
        positions
            .validators
            .extend(runner.validators.into_iter().map(|validator| validator.id));
        if let Some(network) = runner.networks.first() {
            let entry = positions
                .lsd_network_balance
                .entry(network.clone())
                .or_insert(Wei::ZERO);
            *entry = entry.saturating_add(NODE_RUNNER_BOND.saturating_mul(bonded));
        }
    }

    Ok(positions)
}

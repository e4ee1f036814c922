//! Read-only chain data from the dapp and LSD subgraphs.

use async_trait::async_trait;
use lsd_dapp_interface::{Address, BlsPublicKey, NetworkRecord, ValidatorStatus, Wei};
use serde::{Deserialize, Serialize};

pub mod aggregations;
pub mod client;
pub mod dto;
pub mod queries;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use aggregations::{
    available_to_stake, node_operator_positions, NodeOperatorPositions, StakeSource,
};
pub use client::{SubgraphClient, SubgraphClientError};
#[cfg(any(test, feature = "mock"))]
pub use mock::StaticSubgraph;

/// A giant pool and the ETH it can still deploy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiantPool {
    pub id: Address,
    pub available_to_stake: Wei,
    pub giant_lp_token: Option<Address>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    pub id: BlsPublicKey,
    pub status: ValidatorStatus,
    pub liquid_staking_manager: Option<Address>,
}

/// Node runner with its non-withdrawn validators and the networks it joined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRunnerRecord {
    pub id: Address,
    pub validators: Vec<ValidatorRecord>,
    pub networks: Vec<Address>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: Address,
    pub ticker: String,
}

/// Every validator a node runner registered, with the networks it belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRunnerOverview {
    pub validators: Vec<ValidatorRecord>,
    pub networks: Vec<NetworkSummary>,
}

/// Stakehouse registration lifecycle of a validator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleStatus {
    Unbegun,
    InitialsRegistered,
    DepositCompleted,
    TokensMinted,
    Exited,
    Other(String),
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleStatus::Unbegun => "UNBEGUN",
            LifecycleStatus::InitialsRegistered => "INITIALS_REGISTERED",
            LifecycleStatus::DepositCompleted => "DEPOSIT_COMPLETED",
            LifecycleStatus::TokensMinted => "TOKENS_MINTED",
            LifecycleStatus::Exited => "EXITED",
            LifecycleStatus::Other(value) => value.as_str(),
        }
    }
}

impl From<&str> for LifecycleStatus {
    fn from(value: &str) -> Self {
        match value {
            "UNBEGUN" => LifecycleStatus::Unbegun,
            "INITIALS_REGISTERED" => LifecycleStatus::InitialsRegistered,
            "DEPOSIT_COMPLETED" => LifecycleStatus::DepositCompleted,
            "TOKENS_MINTED" => LifecycleStatus::TokensMinted,
            "EXITED" => LifecycleStatus::Exited,
            other => LifecycleStatus::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakehouseAccount {
    pub id: BlsPublicKey,
    pub lifecycle_status: LifecycleStatus,
    pub deposit_tx_hash: Option<String>,
    pub total_deth_minted: Option<Wei>,
    pub mint_from_block_number: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: String,
    pub key: String,
    pub value: Option<String>,
    pub bls_public_key: Option<BlsPublicKey>,
    pub block_number: u64,
}

/// LP token held by a giant pool inside one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpToken {
    pub id: Address,
    pub token_type: String,
    pub giant_pool_balance: Wei,
}

/// Typed queries against the subgraphs.
///
/// Account arguments are matched case-insensitively; implementations
/// lowercase them before querying.
#[async_trait]
pub trait SubgraphReader: Send + Sync {
    async fn giant_sav_eth_pools(&self) -> Result<Vec<GiantPool>, SubgraphClientError>;
    async fn giant_fees_and_mev_pools(&self) -> Result<Vec<GiantPool>, SubgraphClientError>;

    async fn networks(&self) -> Result<Vec<NetworkRecord>, SubgraphClientError>;
    async fn network(
        &self,
        liquid_staking_manager: &str,
    ) -> Result<Option<NetworkRecord>, SubgraphClientError>;
    async fn networks_by_dao(&self, dao: &str) -> Result<Vec<NetworkRecord>, SubgraphClientError>;

    async fn node_runners(&self, account: &str)
        -> Result<Vec<NodeRunnerRecord>, SubgraphClientError>;
    async fn node_runner_validators_by_status(
        &self,
        account: &str,
        status: &ValidatorStatus,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError>;
    async fn node_runner_overview(
        &self,
        account: &str,
    ) -> Result<NodeRunnerOverview, SubgraphClientError>;
    /// Validators of `account` in `network` still waiting for ETH.
    async fn waiting_validators(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError>;
    async fn smart_wallet(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Option<Address>, SubgraphClientError>;
    async fn minted_validators(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError>;

    async fn stakehouse_account(
        &self,
        bls_public_key: &str,
    ) -> Result<Option<StakehouseAccount>, SubgraphClientError>;
    async fn activity(&self, account: &str) -> Result<Vec<ActivityEvent>, SubgraphClientError>;
    async fn lp_tokens(
        &self,
        network: &str,
        token_type: &str,
    ) -> Result<Vec<LpToken>, SubgraphClientError>;
}

//! What the manage view shows for each of a node runner's validators.

use lsd_dapp_interface::{NetworkRecord, ValidatorStatus, Wei};
use serde::{Deserialize, Serialize};

use crate::subgraph::{
    available_to_stake, StakeSource, SubgraphClientError, SubgraphReader, ValidatorRecord,
};

/// Pool depth below which the stake button is disabled, in whole ETH.
pub const MIN_MAIN_POOL_ETH: u64 = 28;
pub const MIN_STAKING_POOL_ETH: u64 = 24;
pub const MIN_FEES_AND_MEV_POOL_ETH: u64 = 4;

/// ETH a giant pool can deploy plus what it has already committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFigures {
    pub available: Wei,
    pub in_progress: Wei,
}

impl PoolFigures {
    pub fn total(&self) -> Wei {
        self.available.saturating_add(self.in_progress)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLiquidity {
    pub main: PoolFigures,
    pub staking: PoolFigures,
    pub fees_and_mev: PoolFigures,
}

impl PoolLiquidity {
    /// Reads the available amounts from the subgraph. In-progress amounts
    /// are not indexed and start at zero.
    pub async fn load(reader: &dyn SubgraphReader) -> Result<Self, SubgraphClientError> {
        let figures = |available| PoolFigures {
            available,
            in_progress: Wei::ZERO,
        };
        Ok(Self {
            main: figures(available_to_stake(reader, StakeSource::Main, None).await?),
            staking: figures(available_to_stake(reader, StakeSource::Staking, None).await?),
            fees_and_mev: figures(available_to_stake(reader, StakeSource::FeesMev, None).await?),
        })
    }
}

/// Whether stake buttons are disabled for every validator of the account:
/// one of them is already staked, or a giant pool is too shallow to fund
/// another validator.
pub fn already_has_staked(validators: &[ValidatorRecord], liquidity: &PoolLiquidity) -> bool {
    validators
        .iter()
        .any(|validator| validator.status == ValidatorStatus::Staked)
        || liquidity.main.total() < Wei::from_ether(MIN_MAIN_POOL_ETH)
        || liquidity.staking.total() < Wei::from_ether(MIN_STAKING_POOL_ETH)
        || liquidity.fees_and_mev.total() < Wei::from_ether(MIN_FEES_AND_MEV_POOL_ETH)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorAction {
    MintAvailable,
    Stake { enabled: bool },
    WaitingForEth,
    Label(String),
    /// Nothing is shown for statuses the view does not know.
    Hidden,
}

/// Status cell of a validator row. Minting takes precedence over the
/// subgraph status.
pub fn validator_action(
    status: &ValidatorStatus,
    ready_to_stake: bool,
    already_has_staked: bool,
    minting_available: bool,
) -> ValidatorAction {
    if minting_available {
        return ValidatorAction::MintAvailable;
    }
    match status {
        ValidatorStatus::Staked => ValidatorAction::Label("STAKED".into()),
        ValidatorStatus::Banned => ValidatorAction::Label("BANNED".into()),
        ValidatorStatus::DerivativesMinted => ValidatorAction::Label("MINTED".into()),
        ValidatorStatus::ReadyToStake => ValidatorAction::Stake {
            enabled: !already_has_staked,
        },
        ValidatorStatus::WaitingForEth if ready_to_stake => ValidatorAction::Stake {
            enabled: !already_has_staked,
        },
        ValidatorStatus::WaitingForEth => ValidatorAction::WaitingForEth,
        ValidatorStatus::Withdrawn | ValidatorStatus::Other(_) => ValidatorAction::Hidden,
    }
}

/// Ticker of the network a validator belongs to.
pub fn network_ticker<'a>(
    validator: &ValidatorRecord,
    networks: &'a [NetworkRecord],
) -> Option<&'a str> {
    let manager = validator.liquid_staking_manager.as_deref()?;
    networks
        .iter()
        .find(|network| network.liquid_staking_manager.eq_ignore_ascii_case(manager))
        .map(|network| network.ticker.as_str())
}

/// Validators whose network ticker contains `query`, ignoring case. An
/// empty query keeps every validator that belongs to a known network.
pub fn filter_by_ticker<'a>(
    validators: &'a [ValidatorRecord],
    networks: &[NetworkRecord],
    query: &str,
) -> Vec<&'a ValidatorRecord> {
    let query = query.trim().to_lowercase();
    validators
        .iter()
        .filter(|validator| {
            network_ticker(validator, networks)
                .map(|ticker| query.is_empty() || ticker.to_lowercase().contains(&query))
                .unwrap_or(false)
        })
        .collect()
}

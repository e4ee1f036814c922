//! Reward balances and claims for the three reward sources.
//!
//! Protected staking rewards are gated by the giant savETH LP token's
//! interaction window: while the account is not eligible its staking reward
//! reads as zero and the staking claim is refused. That gate never surfaces
//! as a read error.

use std::collections::BTreeMap;
use std::sync::Arc;

use lsd_dapp_interface::{Account, Address, DappAction, Wei, WithdrawMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{connected, settle, Precondition, TransactionOutcome};
use crate::forms::{validate_claim_amount, ValidationError};
use crate::sdk::{LsdWizard, SdkError};
use crate::services::DappServices;
use crate::session::Session;
use crate::subgraph::{SubgraphClientError, SubgraphReader};
use crate::telemetry::DappTelemetry;
use crate::tx_link::TransactionLinkResolver;

#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Subgraph(#[from] SubgraphClientError),
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("select an LSD network first")]
    NetworkRequired,
    #[error("protected staking rewards cannot be claimed yet")]
    NotEligible,
    #[error("no validator in this network has minted derivatives")]
    NoMintedValidators,
}

/// Claimable balance for one reward mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBalance {
    pub amount: Wei,
    /// Whether the claim button is enabled for this mode.
    pub eligible: bool,
}

/// Rewards across every source, used by the manage view header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBalances {
    pub staking: Wei,
    pub fees_and_mev: Wei,
    /// Node operator rewards keyed by liquid staking manager. Networks where
    /// the account has no smart wallet are absent.
    pub node_operator: BTreeMap<Address, Wei>,
    pub staking_eligible: bool,
}

impl RewardBalances {
    pub fn total(&self) -> Wei {
        self.node_operator
            .values()
            .fold(self.staking.saturating_add(self.fees_and_mev), |total, reward| {
                total.saturating_add(*reward)
            })
    }
}

/// Reward previews and claims for the connected account.
#[derive(Clone)]
pub struct Rewards {
    subgraph: Arc<dyn SubgraphReader>,
    links: TransactionLinkResolver,
    telemetry: DappTelemetry,
}

impl Rewards {
    pub fn new(services: &DappServices) -> Self {
        Self {
            subgraph: Arc::clone(&services.subgraph),
            links: services.links.clone(),
            telemetry: services.telemetry.clone(),
        }
    }

    /// Whether `account` may currently interact with the giant savETH LP
    /// token. Without a known LP token there is nothing to gate on.
    pub async fn staking_eligibility(
        &self,
        sdk: &dyn LsdWizard,
        account: &Account,
    ) -> Result<bool, RewardsError> {
        let pools = self.subgraph.giant_sav_eth_pools().await?;
        let Some(lp_token) = pools.into_iter().next().and_then(|pool| pool.giant_lp_token) else {
            return Ok(true);
        };
        let timestamp = sdk
            .last_interacted_timestamp(&account.address, &lp_token)
            .await?;
        let eligible = sdk
            .is_eligible_to_interact_with_giant_lp_token(timestamp)
            .await?;
        debug!(account = %account.address, timestamp, eligible, "giant LP token eligibility");
        Ok(eligible)
    }

    /// Node operator reward in `network`, or `None` when the account has no
    /// smart wallet there.
    async fn node_operator_reward(
        &self,
        sdk: &dyn LsdWizard,
        account: &Account,
        network: &str,
    ) -> Result<Option<Wei>, RewardsError> {
        let Some(smart_wallet) = self.subgraph.smart_wallet(&account.address, network).await?
        else {
            return Ok(None);
        };
        let syndicate = self
            .subgraph
            .network(network)
            .await?
            .and_then(|record| record.fee_recipient_and_syndicate)
            .unwrap_or_default();
        let reward = sdk
            .preview_node_operator_rewards(&syndicate, network, &account.address, &smart_wallet)
            .await?;
        Ok(Some(reward))
    }

    /// Claimable amount for one mode. Node operator mode needs `network`.
    /// Staking rewards read as zero while the account is not eligible.
    pub async fn balance(
        &self,
        session: &Session,
        mode: WithdrawMode,
        network: Option<&str>,
    ) -> Result<RewardBalance, RewardsError> {
        let (account, sdk) = connected(session)?;
        let sdk = sdk.as_ref();
        match mode {
            WithdrawMode::Staking => {
                let eligible = self.staking_eligibility(sdk, account).await?;
                let amount = if eligible {
                    sdk.protected_staking_rewards(&account.address).await?
                } else {
                    Wei::ZERO
                };
                Ok(RewardBalance { amount, eligible })
            }
            WithdrawMode::FeesMev => Ok(RewardBalance {
                amount: sdk.preview_fees_and_mev_rewards(&account.address).await?,
                eligible: true,
            }),
            WithdrawMode::NodeOperator => {
                let network = network.ok_or(RewardsError::NetworkRequired)?;
                let amount = self
                    .node_operator_reward(sdk, account, network)
                    .await?
                    .unwrap_or(Wei::ZERO);
                Ok(RewardBalance {
                    amount,
                    eligible: true,
                })
            }
        }
    }

    /// Staking, fees and MEV, and node operator rewards across every network.
    pub async fn totals(&self, session: &Session) -> Result<RewardBalances, RewardsError> {
        let (account, sdk) = connected(session)?;
        let sdk = sdk.as_ref();

        let staking_eligible = self.staking_eligibility(sdk, account).await?;
        let staking = sdk.protected_staking_rewards(&account.address).await?;
        let mut balances = RewardBalances {
            staking: if staking_eligible { staking } else { Wei::ZERO },
            fees_and_mev: sdk.preview_fees_and_mev_rewards(&account.address).await?,
            node_operator: BTreeMap::new(),
            staking_eligible,
        };

        for network in self.subgraph.networks().await? {
            let manager = network.liquid_staking_manager;
            if let Some(reward) = self.node_operator_reward(sdk, account, &manager).await? {
                balances.node_operator.insert(manager, reward);
            }
        }
        Ok(balances)
    }

    /// Claims `amount` of the rewards for `mode`.
    pub async fn claim(
        &self,
        session: &Session,
        mode: WithdrawMode,
        amount: Wei,
        network: Option<&str>,
    ) -> Result<TransactionOutcome, RewardsError> {
        let result = self.submit_claim(session, mode, amount, network).await;
        self.telemetry.observe(DappAction::Claim, result)
    }

    async fn submit_claim(
        &self,
        session: &Session,
        mode: WithdrawMode,
        amount: Wei,
        network: Option<&str>,
    ) -> Result<TransactionOutcome, RewardsError> {
        let (account, sdk) = connected(session)?;
        let transaction = match mode {
            WithdrawMode::Staking => {
                let balance = self.balance(session, mode, None).await?;
                if !balance.eligible {
                    return Err(RewardsError::NotEligible);
                }
                check_claim(balance.amount, amount)?;
                sdk.claim_protected_staking_rewards(&account.address, amount)
                    .await?
            }
            WithdrawMode::FeesMev => {
                let balance = sdk.preview_fees_and_mev_rewards(&account.address).await?;
                check_claim(balance, amount)?;
                sdk.claim_fees_and_mev_rewards(&account.address, amount)
                    .await?
            }
            WithdrawMode::NodeOperator => {
                let network = network.ok_or(RewardsError::NetworkRequired)?;
                let keys: Vec<String> = self
                    .subgraph
                    .minted_validators(&account.address, network)
                    .await?
                    .into_iter()
                    .map(|validator| validator.id)
                    .collect();
                if keys.is_empty() {
                    return Err(RewardsError::NoMintedValidators);
                }
                info!(network, validators = keys.len(), "claiming node operator rewards");
                sdk.claim_rewards_as_node_runner(network, &account.address, &keys)
                    .await?
            }
        };
        Ok(settle(&self.links, account, transaction).await?)
    }
}

fn check_claim(balance: Wei, amount: Wei) -> Result<(), ValidationError> {
    match validate_claim_amount(Some(balance), Some(amount)) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

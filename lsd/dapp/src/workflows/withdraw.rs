use std::sync::Arc;

use lsd_dapp_interface::{
    Account, BlsPublicKey, DappAction, FundingPool, Wei, WithdrawMode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{connected, settle, Precondition, TransactionOutcome};
use crate::forms::{validate_withdraw_amount, ValidationError};
use crate::sdk::{LsdWizard, SdkError};
use crate::services::DappServices;
use crate::session::Session;
use crate::subgraph::{
    node_operator_positions, NodeOperatorPositions, SubgraphClientError, SubgraphReader,
};
use crate::telemetry::DappTelemetry;
use crate::tx_link::TransactionLinkResolver;

#[derive(Debug, thiserror::Error)]
pub enum WithdrawError {
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
    #[error("select a validator first")]
    ValidatorRequired,
}

/// Withdrawable balances for every mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawBalances {
    pub staking: Wei,
    pub fees_and_mev: Wei,
    pub node_operator: NodeOperatorPositions,
}

impl WithdrawBalances {
    /// Balance shown for `mode`.
    pub fn for_mode(&self, mode: WithdrawMode) -> Wei {
        match mode {
            WithdrawMode::Staking => self.staking,
            WithdrawMode::FeesMev => self.fees_and_mev,
            WithdrawMode::NodeOperator => self.node_operator.total(),
        }
    }

    pub fn total(&self) -> Wei {
        self.staking
            .saturating_add(self.fees_and_mev)
            .saturating_add(self.node_operator.total())
    }
}

/// One withdrawal as entered in the form.
#[derive(Clone, Copy, Debug)]
pub struct WithdrawRequest<'a> {
    pub mode: WithdrawMode,
    pub amount: Wei,
    /// Liquid staking manager; node operator mode only.
    pub network: Option<&'a str>,
    /// Validator whose bond is withdrawn; node operator mode only.
    pub bls_public_key: Option<&'a str>,
}

fn pool(mode: WithdrawMode) -> Option<FundingPool> {
    match mode {
        WithdrawMode::Staking => Some(FundingPool::SavEth),
        WithdrawMode::FeesMev => Some(FundingPool::FeesAndMev),
        WithdrawMode::NodeOperator => None,
    }
}

/// Withdrawals from the giant pools and of node operator bonds.
#[derive(Clone)]
pub struct Withdrawals {
    subgraph: Arc<dyn SubgraphReader>,
    links: TransactionLinkResolver,
    min_amount: Wei,
    telemetry: DappTelemetry,
}

impl Withdrawals {
    pub fn new(services: &DappServices) -> Self {
        Self {
            subgraph: Arc::clone(&services.subgraph),
            links: services.links.clone(),
            min_amount: services.limits.min_amount,
            telemetry: services.telemetry.clone(),
        }
    }

    /// Pool LP balances plus the node operator positions from the subgraph.
    pub async fn balances(&self, session: &Session) -> Result<WithdrawBalances, WithdrawError> {
        let (account, sdk) = connected(session)?;
        let staking = sdk
            .pool_balance(FundingPool::SavEth, &account.address)
            .await?;
        let fees_and_mev = sdk
            .pool_balance(FundingPool::FeesAndMev, &account.address)
            .await?;
        let node_operator = self.positions(account).await?;
        Ok(WithdrawBalances {
            staking,
            fees_and_mev,
            node_operator,
        })
    }

    async fn positions(&self, account: &Account) -> Result<NodeOperatorPositions, WithdrawError> {
        let networks = self.subgraph.networks().await?;
        Ok(node_operator_positions(self.subgraph.as_ref(), &account.address, &networks).await?)
    }

    /// Validators the account can withdraw a bond for in `network`.
    pub async fn withdrawable_validators(
        &self,
        session: &Session,
        network: &str,
    ) -> Result<Vec<BlsPublicKey>, WithdrawError> {
        let account = session
            .account
            .as_ref()
            .ok_or(Precondition::NotConnected)?;
        Ok(self
            .subgraph
            .waiting_validators(&account.address, network)
            .await?
            .into_iter()
            .map(|validator| validator.id)
            .collect())
    }

    /// Balance the withdrawal form checks against: the pool balance, or the
    /// bonds held in the selected network.
    async fn balance_for(
        &self,
        sdk: &dyn LsdWizard,
        account: &Account,
        request: &WithdrawRequest<'_>,
    ) -> Result<Wei, WithdrawError> {
        match pool(request.mode) {
            Some(pool) => Ok(sdk.pool_balance(pool, &account.address).await?),
            None => {
                let network = request.network.ok_or(WithdrawError::NetworkRequired)?;
                Ok(self.positions(account).await?.balance_for(network))
            }
        }
    }

    /// Validates `request` against its balance and the minimum amount, then
    /// submits it.
    pub async fn withdraw(
        &self,
        session: &Session,
        request: WithdrawRequest<'_>,
    ) -> Result<TransactionOutcome, WithdrawError> {
        let result = self.submit(session, request).await;
        self.telemetry.observe(DappAction::Withdraw, result)
    }

    async fn submit(
        &self,
        session: &Session,
        request: WithdrawRequest<'_>,
    ) -> Result<TransactionOutcome, WithdrawError> {
        let (account, sdk) = connected(session)?;
        let balance = self.balance_for(sdk.as_ref(), account, &request).await?;
        if let Some(err) = validate_withdraw_amount(Some(balance), Some(request.amount), self.min_amount)
        {
            return Err(err.into());
        }

        let transaction = match pool(request.mode) {
            Some(pool) => {
                info!(pool = pool.title(), amount = %request.amount, "withdrawing from giant pool");
                sdk.withdraw_eth(pool, request.amount).await?
            }
            None => {
                let network = request.network.ok_or(WithdrawError::NetworkRequired)?;
                let bls_public_key = request
                    .bls_public_key
                    .ok_or(WithdrawError::ValidatorRequired)?;
                info!(network, bls_public_key, "withdrawing node runner bond");
                sdk.withdraw_eth_for_knot(network, &account.address, bls_public_key)
                    .await?
            }
        };
        Ok(settle(&self.links, account, transaction).await?)
    }
}

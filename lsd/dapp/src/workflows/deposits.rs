use lsd_dapp_interface::{DappAction, FundingPool, Wei};
use tracing::info;

use super::{connected, settle, Precondition, TransactionOutcome};
use crate::deposit::{DepositError, DepositObject};
use crate::forms::{validate_deposit_amount, ValidationError};
use crate::sdk::SdkError;
use crate::services::{DappServices, StakingLimits};
use crate::session::Session;
use crate::telemetry::DappTelemetry;
use crate::tx_link::TransactionLinkResolver;

/// Shown whenever a node runner deposit cannot even be attempted.
pub const NODE_RUNNER_DEPOSIT_MESSAGE: &str =
    "Please ensure your deposit_data.json file is correct, and that you have 4 ETH in your wallet.";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DepositsError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Please ensure your deposit_data.json file is correct, and that you have 4 ETH in your wallet.")]
    NodeRunnerNotReady,
    #[error(transparent)]
    Deposit(#[from] DepositError),
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Inputs of the node runner form. Missing pieces are reported together.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeRunnerDeposit<'a> {
    pub network: Option<&'a str>,
    pub deposit: Option<&'a DepositObject>,
}

/// Pool deposits and node runner bond registration.
#[derive(Clone)]
pub struct Deposits {
    links: TransactionLinkResolver,
    limits: StakingLimits,
    telemetry: DappTelemetry,
}

impl Deposits {
    pub fn new(services: &DappServices) -> Self {
        Self {
            links: services.links.clone(),
            limits: services.limits.clone(),
            telemetry: services.telemetry.clone(),
        }
    }

    /// Deposits `amount` into a giant pool after checking it against the
    /// minimum and the wallet balance.
    pub async fn deposit(
        &self,
        session: &Session,
        pool: FundingPool,
        amount: Wei,
    ) -> Result<TransactionOutcome, DepositsError> {
        let action = match pool {
            FundingPool::SavEth => DappAction::DepositStaking,
            FundingPool::FeesAndMev => DappAction::DepositFeesMev,
        };
        let result = self.deposit_into_pool(session, pool, amount).await;
        self.telemetry.observe(action, result)
    }

    async fn deposit_into_pool(
        &self,
        session: &Session,
        pool: FundingPool,
        amount: Wei,
    ) -> Result<TransactionOutcome, DepositsError> {
        let (account, sdk) = connected(session)?;
        let balance = sdk.account_balance(&account.address).await?;
        validate_deposit_amount(balance, amount, self.limits.min_amount)?;

        info!(pool = pool.title(), amount = %amount, "depositing into giant pool");
        let transaction = sdk.deposit_eth(pool, amount).await?;
        Ok(settle(&self.links, account, transaction).await?)
    }

    /// Registers the uploaded validator with a 4 ETH bond in `network`.
    pub async fn deposit_as_node_runner(
        &self,
        session: &Session,
        request: NodeRunnerDeposit<'_>,
    ) -> Result<TransactionOutcome, DepositsError> {
        let result = self.register(session, request).await;
        self.telemetry.observe(DappAction::DepositNodeRunner, result)
    }

    async fn register(
        &self,
        session: &Session,
        request: NodeRunnerDeposit<'_>,
    ) -> Result<TransactionOutcome, DepositsError> {
        let (Some(network), Some(deposit), Some(account)) =
            (request.network, request.deposit, session.account.as_ref())
        else {
            return Err(DepositsError::NodeRunnerNotReady);
        };
        let sdk = session.sdk().ok_or(Precondition::SdkUnavailable)?;

        let required = self
            .limits
            .node_runner_bond
            .saturating_add(self.limits.max_gas_fee);
        if sdk.account_balance(&account.address).await? < required {
            return Err(DepositsError::NodeRunnerNotReady);
        }
        deposit.validate_credentials(&self.limits.withdrawal_credentials)?;

        let entry = deposit.primary();
        info!(network, bls_public_key = %entry.pubkey, "registering node runner bond");
        let transaction = sdk
            .deposit_eth_by_node_runner(
                network,
                &entry.pubkey,
                &entry.signature,
                &account.address,
                self.limits.node_runner_bond,
            )
            .await?;
        Ok(settle(&self.links, account, transaction).await?)
    }
}

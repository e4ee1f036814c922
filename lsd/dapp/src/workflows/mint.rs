use std::sync::Arc;

use lsd_dapp_interface::DappAction;
use tracing::{info, warn};

use super::{connected, settle, Precondition, TransactionOutcome};
use crate::deposit::add_0x;
use crate::sdk::{FinalisedEpochReport, SdkError};
use crate::services::DappServices;
use crate::session::Session;
use crate::subgraph::{LifecycleStatus, StakehouseAccount, SubgraphClientError, SubgraphReader};
use crate::telemetry::DappTelemetry;
use crate::tx_link::TransactionLinkResolver;

/// Active balance, in gwei, a validator needs before derivatives can be minted.
pub const MIN_ACTIVE_BALANCE_GWEI: u64 = 32_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Subgraph(#[from] SubgraphClientError),
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error("Please ensure your validator is active on the consensus layer and has a balance of 32+ ETH.")]
    NotEligible,
}

/// A validator may mint once it activated before the current checkpoint and
/// holds at least 32 ETH on the consensus layer.
pub fn approve_for_minting(report: &FinalisedEpochReport) -> bool {
    report.activation_epoch < report.current_checkpoint_epoch
        && report.active_balance >= MIN_ACTIVE_BALANCE_GWEI
}

/// Minting opens once the deposit completed and the chain has moved past the
/// account's mint block.
pub fn minting_available(account: Option<&StakehouseAccount>, current_block: u64) -> bool {
    let Some(account) = account else {
        return false;
    };
    match account.mint_from_block_number {
        Some(mint_from) => {
            account.lifecycle_status == LifecycleStatus::DepositCompleted
                && current_block > mint_from
        }
        None => false,
    }
}

/// Derivative minting for staked validators.
#[derive(Clone)]
pub struct Minter {
    subgraph: Arc<dyn SubgraphReader>,
    links: TransactionLinkResolver,
    telemetry: DappTelemetry,
}

impl Minter {
    pub fn new(services: &DappServices) -> Self {
        Self {
            subgraph: Arc::clone(&services.subgraph),
            links: services.links.clone(),
            telemetry: services.telemetry.clone(),
        }
    }

    /// Whether `bls_public_key` may mint at `current_block`.
    pub async fn is_available(
        &self,
        bls_public_key: &str,
        current_block: u64,
    ) -> Result<bool, MintError> {
        let account = self.subgraph.stakehouse_account(bls_public_key).await?;
        Ok(minting_available(account.as_ref(), current_block))
    }

    /// Consensus-layer eligibility check run before the mint dialog opens.
    /// A failed report lookup counts as not eligible.
    pub async fn approve(&self, session: &Session, bls_public_key: &str) -> Result<(), MintError> {
        let (_, sdk) = connected(session)?;
        match sdk.finalised_epoch_report(bls_public_key).await {
            Ok(report) if approve_for_minting(&report) => Ok(()),
            Ok(_) => Err(MintError::NotEligible),
            Err(err) => {
                warn!(bls_public_key, error = %err, "finalised epoch report unavailable");
                Err(MintError::NotEligible)
            }
        }
    }

    /// Fetches a signed balance report and mints derivatives in the
    /// validator's network.
    pub async fn mint(
        &self,
        session: &Session,
        bls_public_key: &str,
    ) -> Result<TransactionOutcome, MintError> {
        let result = self.submit(session, bls_public_key).await;
        self.telemetry.observe(DappAction::Mint, result)
    }

    async fn submit(
        &self,
        session: &Session,
        bls_public_key: &str,
    ) -> Result<TransactionOutcome, MintError> {
        let (account, sdk) = connected(session)?;
        let report = sdk.report_balance(bls_public_key).await?;
        let network = sdk.lsdn_for_bls_public_key(bls_public_key).await?;
        info!(network = %network, bls_public_key, "minting derivatives");
        let transaction = sdk
            .mint_derivatives(&network, &add_0x(bls_public_key), &report)
            .await?;
        Ok(settle(&self.links, account, transaction).await?)
    }
}

//! User-facing workflows built on the session, SDK and subgraph seams.

use std::sync::Arc;

use lsd_dapp_interface::{Account, TxHash};
use serde::{Deserialize, Serialize};

use crate::sdk::{LsdWizard, SdkError, TransactionResult};
use crate::session::Session;
use crate::tx_link::TransactionLinkResolver;

pub mod admin;
pub mod deposits;
pub mod funding;
pub mod mint;
pub mod readiness;
pub mod rewards;
pub mod stake;
pub mod stake_flow;
pub mod staking;
pub mod withdraw;

pub use admin::{AdminError, CreateNetworkRequest, NetworkAdmin};
pub use deposits::{Deposits, DepositsError, NodeRunnerDeposit, NODE_RUNNER_DEPOSIT_MESSAGE};
pub use funding::{FundingDispatcher, FundingError};
pub use mint::{approve_for_minting, minting_available, MintError, Minter};
pub use readiness::{ReadinessEvaluator, ReadinessReport};
pub use rewards::{RewardBalance, RewardBalances, Rewards, RewardsError};
pub use stake::{StakeError, StakeRequest, StakeSubmitter, INVALID_KEYSTORE_MESSAGE};
pub use stake_flow::{StakeFlow, StakeStep, TransitionError};
pub use staking::{StakeWorkflow, StakeWorkflowError};
pub use withdraw::{WithdrawBalances, WithdrawError, WithdrawRequest, Withdrawals};

/// Session state every mutating workflow needs before talking to the SDK.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    #[error("no wallet is connected")]
    NotConnected,
    #[error("the SDK is not available for the connected wallet")]
    SdkUnavailable,
}

/// Acting account and SDK of a session, or the first missing piece.
pub(crate) fn connected(
    session: &Session,
) -> Result<(&Account, &Arc<dyn LsdWizard>), Precondition> {
    let account = session
        .account
        .as_ref()
        .ok_or(Precondition::NotConnected)?;
    let sdk = session.sdk().ok_or(Precondition::SdkUnavailable)?;
    Ok((account, sdk))
}

/// A confirmed transaction and the explorer link shown for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub hash: TxHash,
    /// `None` while a proxy transaction has no on-chain hash yet.
    pub explorer_link: Option<String>,
}

/// Waits for one confirmation, then resolves the explorer link for `account`.
pub(crate) async fn settle(
    links: &TransactionLinkResolver,
    account: &Account,
    transaction: TransactionResult,
) -> Result<TransactionOutcome, SdkError> {
    transaction.wait().await?;
    let explorer_link = links.resolve(account, transaction.hash()).await;
    Ok(TransactionOutcome {
        hash: transaction.hash().clone(),
        explorer_link,
    })
}

//! Explicit state machine behind the stake wizard.
//!
//! The wizard walks a validator from deposit upload through the two funding
//! steps to the BLS-authenticated stake transaction. Funding steps with a
//! zero shortfall are skipped, and fees-and-MEV funding only opens once the
//! savETH step is done. Any error moves the machine to [`StakeStep::Failed`];
//! retrying returns to the upload step with every transient input dropped.

use std::fmt;

use lsd_dapp_interface::{FundingPool, FundingRequirement, TxHash};
use serde::{Deserialize, Serialize};

use crate::deposit::{DepositObject, KeystoreObject};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeStep {
    #[default]
    UploadDeposit,
    FundingSavEth,
    FundingFeesMev,
    AwaitingKeystore,
    Approving,
    AwaitingConfirmation,
    Success,
    Failed,
}

impl StakeStep {
    pub const fn label(self) -> &'static str {
        match self {
            StakeStep::UploadDeposit => "upload deposit",
            StakeStep::FundingSavEth => "funding savETH",
            StakeStep::FundingFeesMev => "funding fees and MEV",
            StakeStep::AwaitingKeystore => "awaiting keystore",
            StakeStep::Approving => "approving",
            StakeStep::AwaitingConfirmation => "awaiting confirmation",
            StakeStep::Success => "success",
            StakeStep::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, StakeStep::Success | StakeStep::Failed)
    }
}

impl fmt::Display for StakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An action attempted from a step that does not allow it.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot {action} while {from}")]
pub struct TransitionError {
    pub from: StakeStep,
    pub action: &'static str,
}

/// Step machine of the stake wizard. Funding flags only ever move from
/// pending to done.
#[derive(Clone, Debug, Default)]
pub struct StakeFlow {
    step: StakeStep,
    deposit: Option<DepositObject>,
    funding: Option<FundingRequirement>,
    sav_eth_done: bool,
    fees_and_mev_done: bool,
    keystore: Option<KeystoreObject>,
    transaction: Option<TxHash>,
    error: Option<String>,
}

impl StakeFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> StakeStep {
        self.step
    }

    pub fn deposit(&self) -> Option<&DepositObject> {
        self.deposit.as_ref()
    }

    pub fn funding(&self) -> Option<&FundingRequirement> {
        self.funding.as_ref()
    }

    pub fn keystore(&self) -> Option<&KeystoreObject> {
        self.keystore.as_ref()
    }

    pub fn transaction(&self) -> Option<&TxHash> {
        self.transaction.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether `pool` has been funded or had no shortfall.
    pub fn is_done(&self, pool: FundingPool) -> bool {
        match pool {
            FundingPool::SavEth => self.sav_eth_done,
            FundingPool::FeesAndMev => self.fees_and_mev_done,
        }
    }

    pub fn can_fund_sav_eth(&self) -> bool {
        self.step == StakeStep::FundingSavEth && !self.sav_eth_done
    }

    pub fn can_fund_fees_and_mev(&self) -> bool {
        self.step == StakeStep::FundingFeesMev && self.sav_eth_done && !self.fees_and_mev_done
    }

    pub fn can_fund(&self, pool: FundingPool) -> bool {
        match pool {
            FundingPool::SavEth => self.can_fund_sav_eth(),
            FundingPool::FeesAndMev => self.can_fund_fees_and_mev(),
        }
    }

    /// Both pools funded and a keystore supplied.
    pub fn can_approve(&self) -> bool {
        self.step == StakeStep::Approving
            && self.keystore.is_some()
            && self.sav_eth_done
            && self.fees_and_mev_done
    }

    fn expect(&self, step: StakeStep, action: &'static str) -> Result<(), TransitionError> {
        if self.step == step {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.step,
                action,
            })
        }
    }

    pub fn deposit_uploaded(&mut self, deposit: DepositObject) -> Result<(), TransitionError> {
        self.expect(StakeStep::UploadDeposit, "upload a deposit file")?;
        self.deposit = Some(deposit);
        self.step = StakeStep::FundingSavEth;
        Ok(())
    }

    /// Records the validator's shortfalls and skips funding steps that have
    /// nothing left to fund.
    pub fn funds_evaluated(&mut self, funding: FundingRequirement) -> Result<(), TransitionError> {
        self.expect(StakeStep::FundingSavEth, "evaluate funding")?;
        self.sav_eth_done = funding.shortfall(FundingPool::SavEth).is_zero();
        self.fees_and_mev_done = funding.shortfall(FundingPool::FeesAndMev).is_zero();
        self.funding = Some(funding);
        self.advance_funding();
        Ok(())
    }

    pub fn sav_eth_funded(&mut self) -> Result<(), TransitionError> {
        self.expect(StakeStep::FundingSavEth, "mark savETH funded")?;
        self.sav_eth_done = true;
        self.advance_funding();
        Ok(())
    }

    pub fn fees_and_mev_funded(&mut self) -> Result<(), TransitionError> {
        if !self.can_fund_fees_and_mev() {
            return Err(TransitionError {
                from: self.step,
                action: "mark fees and MEV funded",
            });
        }
        self.fees_and_mev_done = true;
        self.advance_funding();
        Ok(())
    }

    /// Replaces the shortfalls with a fresh readiness result.
    ///
    /// Pools already funded stay funded even when the indexer still reports
    /// a shortfall for them. While funding, a pool whose shortfall dropped to
    /// zero is skipped. Allowed from the funding steps and `AwaitingKeystore`.
    pub fn funding_refreshed(&mut self, funding: FundingRequirement) -> Result<(), TransitionError> {
        let funding_step = matches!(
            self.step,
            StakeStep::FundingSavEth | StakeStep::FundingFeesMev
        );
        if !funding_step && self.step != StakeStep::AwaitingKeystore {
            return Err(TransitionError {
                from: self.step,
                action: "refresh funding",
            });
        }
        self.sav_eth_done |= funding.shortfall(FundingPool::SavEth).is_zero();
        self.fees_and_mev_done |= funding.shortfall(FundingPool::FeesAndMev).is_zero();
        self.funding = Some(funding);
        if funding_step {
            self.advance_funding();
        }
        Ok(())
    }

    fn advance_funding(&mut self) {
        self.step = if !self.sav_eth_done {
            StakeStep::FundingSavEth
        } else if !self.fees_and_mev_done {
            StakeStep::FundingFeesMev
        } else {
            StakeStep::AwaitingKeystore
        };
    }

    pub fn keystore_supplied(&mut self, keystore: KeystoreObject) -> Result<(), TransitionError> {
        self.expect(StakeStep::AwaitingKeystore, "supply a keystore")?;
        self.keystore = Some(keystore);
        self.step = StakeStep::Approving;
        Ok(())
    }

    /// The stake was sent; its receipt is still pending.
    pub fn approval_submitted(&mut self, hash: TxHash) -> Result<(), TransitionError> {
        if !self.can_approve() {
            return Err(TransitionError {
                from: self.step,
                action: "submit the stake",
            });
        }
        self.transaction = Some(hash);
        self.step = StakeStep::AwaitingConfirmation;
        Ok(())
    }

    /// The receipt came back successful. Drops the keystore.
    pub fn confirmed(&mut self) -> Result<(), TransitionError> {
        self.expect(StakeStep::AwaitingConfirmation, "confirm the stake")?;
        self.keystore = None;
        self.step = StakeStep::Success;
        Ok(())
    }

    /// Moves to `Failed`. Allowed from every step except `Success`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        if self.step == StakeStep::Success {
            return Err(TransitionError {
                from: self.step,
                action: "fail",
            });
        }
        self.keystore = None;
        self.error = Some(message.into());
        self.step = StakeStep::Failed;
        Ok(())
    }

    /// Returns a failed flow to the upload step with transient input cleared.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        self.expect(StakeStep::Failed, "retry")?;
        self.dismiss();
        Ok(())
    }

    /// Closes the wizard from any step.
    pub fn dismiss(&mut self) {
        *self = Self::default();
    }
}

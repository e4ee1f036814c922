//! Maps workflow errors onto the four kinds of messages the views show.
//!
//! Validation errors sit next to the offending field, precondition errors
//! block the dialog until the user retries, transaction errors carry the
//! capitalized revert reason, and eligibility errors only disable an action.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deposit::DepositError;
use crate::forms::{TickerError, ValidationError};
use crate::sdk::SdkError;
use crate::subgraph::SubgraphClientError;
use crate::workflows::{
    AdminError, DepositsError, FundingError, MintError, Precondition, RewardsError, StakeError,
    StakeWorkflowError, TransitionError, WithdrawError, INVALID_KEYSTORE_MESSAGE,
};

pub const GENERIC_HEADLINE: &str = "Something went wrong";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Precondition,
    Transaction,
    Eligibility,
}

/// User-facing message plus the underlying detail, when it differs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescription {
    pub kind: ErrorKind,
    pub headline: String,
    pub technical: Option<String>,
}

impl ErrorDescription {
    pub fn new(kind: ErrorKind, headline: impl Into<String>) -> Self {
        Self {
            kind,
            headline: headline.into(),
            technical: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if detail != self.headline {
            self.technical = Some(detail);
        }
        self
    }

    /// Whether the view offers a "Try Again" action.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Precondition | ErrorKind::Transaction)
    }
}

impl fmt::Display for ErrorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline)
    }
}

/// Upper-cases the first character of a revert reason.
pub fn capitalize_reason(reason: &str) -> String {
    let reason = reason.trim();
    let mut chars = reason.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => GENERIC_HEADLINE.to_string(),
    }
}

fn transaction(reason: &str) -> ErrorDescription {
    ErrorDescription::new(ErrorKind::Transaction, capitalize_reason(reason))
}

pub fn describe_sdk(err: &SdkError) -> ErrorDescription {
    match err {
        SdkError::Reverted { reason } => transaction(reason),
        SdkError::Rejected => transaction(&err.to_string()),
        SdkError::Provider(message) => transaction(message),
        SdkError::InvalidKeystore(detail) => {
            ErrorDescription::new(ErrorKind::Precondition, INVALID_KEYSTORE_MESSAGE)
                .with_detail(detail.clone())
        }
        SdkError::NotFound(_) => {
            ErrorDescription::new(ErrorKind::Precondition, capitalize_reason(&err.to_string()))
        }
        SdkError::Unsupported(_) => {
            ErrorDescription::new(ErrorKind::Transaction, GENERIC_HEADLINE)
                .with_detail(err.to_string())
        }
    }
}

pub fn describe_subgraph(err: &SubgraphClientError) -> ErrorDescription {
    ErrorDescription::new(ErrorKind::Transaction, GENERIC_HEADLINE).with_detail(err.to_string())
}

pub fn describe_precondition(err: &Precondition) -> ErrorDescription {
    let headline = match err {
        Precondition::NotConnected => "Please connect your wallet.",
        Precondition::SdkUnavailable => "Please reconnect your wallet and try again.",
    };
    ErrorDescription::new(ErrorKind::Precondition, headline).with_detail(err.to_string())
}

pub fn describe_validation(err: &ValidationError) -> ErrorDescription {
    match err {
        ValidationError::InsufficientBalance => {
            ErrorDescription::new(ErrorKind::Precondition, err.to_string())
        }
        _ => ErrorDescription::new(ErrorKind::Validation, err.to_string()),
    }
}

pub fn describe_ticker(err: &TickerError) -> ErrorDescription {
    ErrorDescription::new(ErrorKind::Validation, err.to_string())
}

pub fn describe_transition(err: &TransitionError) -> ErrorDescription {
    ErrorDescription::new(ErrorKind::Precondition, capitalize_reason(&err.to_string()))
}

pub fn describe_deposit_file(err: &DepositError) -> ErrorDescription {
    match err {
        DepositError::CredentialsMismatch { expected, found } => {
            ErrorDescription::new(ErrorKind::Precondition, err.to_string())
                .with_detail(format!("expected {expected}, found {found}"))
        }
        DepositError::MissingExpectedCredentials => {
            ErrorDescription::new(ErrorKind::Precondition, GENERIC_HEADLINE)
                .with_detail(err.to_string())
        }
        DepositError::InvalidKeystore(detail) => {
            ErrorDescription::new(ErrorKind::Precondition, INVALID_KEYSTORE_MESSAGE)
                .with_detail(detail.clone())
        }
        _ => ErrorDescription::new(ErrorKind::Validation, capitalize_reason(&err.to_string())),
    }
}

pub fn describe_stake(err: &StakeError) -> ErrorDescription {
    match err {
        StakeError::NotConnected => describe_precondition(&Precondition::NotConnected),
        StakeError::SdkUnavailable => describe_precondition(&Precondition::SdkUnavailable),
        StakeError::FundingIncomplete => {
            ErrorDescription::new(ErrorKind::Precondition, capitalize_reason(&err.to_string()))
        }
        StakeError::Password(validation) => describe_validation(validation),
        StakeError::InvalidKeystore(detail) => {
            ErrorDescription::new(ErrorKind::Precondition, INVALID_KEYSTORE_MESSAGE)
                .with_detail(detail.clone())
        }
        StakeError::MissingExpectedCredentials => {
            ErrorDescription::new(ErrorKind::Precondition, GENERIC_HEADLINE)
                .with_detail(err.to_string())
        }
        StakeError::CredentialsMismatch { expected, found } => {
            ErrorDescription::new(ErrorKind::Precondition, err.to_string())
                .with_detail(format!("expected {expected}, found {found}"))
        }
        StakeError::Submission { reason } => transaction(reason),
    }
}

pub fn describe_funding(err: &FundingError) -> ErrorDescription {
    match err {
        FundingError::Sdk(sdk) => describe_sdk(sdk),
    }
}

pub fn describe_deposits(err: &DepositsError) -> ErrorDescription {
    match err {
        DepositsError::Precondition(precondition) => describe_precondition(precondition),
        DepositsError::Validation(validation) => describe_validation(validation),
        DepositsError::NodeRunnerNotReady => {
            ErrorDescription::new(ErrorKind::Precondition, err.to_string())
        }
        DepositsError::Deposit(deposit) => describe_deposit_file(deposit),
        DepositsError::Sdk(sdk) => describe_sdk(sdk),
    }
}

pub fn describe_rewards(err: &RewardsError) -> ErrorDescription {
    match err {
        RewardsError::Precondition(precondition) => describe_precondition(precondition),
        RewardsError::Subgraph(subgraph) => describe_subgraph(subgraph),
        RewardsError::Sdk(sdk) => describe_sdk(sdk),
        RewardsError::Validation(validation) => describe_validation(validation),
        RewardsError::NetworkRequired => {
            ErrorDescription::new(ErrorKind::Validation, capitalize_reason(&err.to_string()))
        }
        RewardsError::NotEligible | RewardsError::NoMintedValidators => {
            ErrorDescription::new(ErrorKind::Eligibility, capitalize_reason(&err.to_string()))
        }
    }
}

pub fn describe_withdraw(err: &WithdrawError) -> ErrorDescription {
    match err {
        WithdrawError::Precondition(precondition) => describe_precondition(precondition),
        WithdrawError::Subgraph(subgraph) => describe_subgraph(subgraph),
        WithdrawError::Sdk(sdk) => describe_sdk(sdk),
        WithdrawError::Validation(validation) => describe_validation(validation),
        WithdrawError::NetworkRequired | WithdrawError::ValidatorRequired => {
            ErrorDescription::new(ErrorKind::Validation, capitalize_reason(&err.to_string()))
        }
    }
}

pub fn describe_mint(err: &MintError) -> ErrorDescription {
    match err {
        MintError::Precondition(precondition) => describe_precondition(precondition),
        MintError::Subgraph(subgraph) => describe_subgraph(subgraph),
        MintError::Sdk(sdk) => describe_sdk(sdk),
        MintError::NotEligible => ErrorDescription::new(ErrorKind::Eligibility, err.to_string()),
    }
}

pub fn describe_admin(err: &AdminError) -> ErrorDescription {
    match err {
        AdminError::Precondition(precondition) => describe_precondition(precondition),
        AdminError::Subgraph(subgraph) => describe_subgraph(subgraph),
        AdminError::Sdk(sdk) => describe_sdk(sdk),
        AdminError::Ticker(ticker) => describe_ticker(ticker),
        AdminError::Validation(validation) => describe_validation(validation),
        AdminError::NetworkNotFound(_) | AdminError::TickerLocked | AdminError::NotDao => {
            ErrorDescription::new(ErrorKind::Precondition, err.to_string())
        }
    }
}

pub fn describe_stake_workflow(err: &StakeWorkflowError) -> ErrorDescription {
    match err {
        StakeWorkflowError::Precondition(precondition) => describe_precondition(precondition),
        StakeWorkflowError::Transition(transition) => describe_transition(transition),
        StakeWorkflowError::Deposit(deposit) => describe_deposit_file(deposit),
        StakeWorkflowError::Funding(funding) => describe_funding(funding),
        StakeWorkflowError::Stake(stake) => describe_stake(stake),
        StakeWorkflowError::NotOpened
        | StakeWorkflowError::Banned
        | StakeWorkflowError::ReadinessUnknown
        | StakeWorkflowError::DepositMismatch { .. } => {
            ErrorDescription::new(ErrorKind::Precondition, err.to_string())
        }
    }
}

//! Input validation shared by the network, deposit and withdrawal forms.

use lsd_dapp_interface::{format_ether, parse_ether, Wei, COMMISSION_SCALE, WEI_PER_ETHER};
use thiserror::Error;

pub const TICKER_MIN_LENGTH: usize = 3;
pub const TICKER_MAX_LENGTH: usize = 5;
pub const PASSWORD_MIN_LENGTH: usize = 8;
pub const COMMISSION_MIN_PERCENT: u64 = 1;
pub const COMMISSION_MAX_PERCENT: u64 = 100;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TickerError {
    #[error("Ticker required")]
    Required,
    #[error("The length of ticker should be more than 3")]
    TooShort,
    #[error("The length of ticker should be less than 5")]
    TooLong,
    #[error("Ticker should be alphabet only")]
    NotAlphabetic,
    #[error("The ticket name already exists")]
    AlreadyExists,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Commission should be a number from 1 to 100.")]
    CommissionOutOfRange,
    #[error("DAO Address required")]
    DaoAddressRequired,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Your password must be 8 or more characters.")]
    PasswordTooShort,
    #[error("Insufficient Balance")]
    InsufficientBalance,
    #[error("Amount should be greater than {min}")]
    BelowMinimum { min: String },
    #[error("Invalid amount")]
    InvalidAmount,
}

/// Validates a ticker in form order: presence, length bounds, alphabet, then
/// collision with `existing` (case-insensitive).
pub fn validate_ticker<S: AsRef<str>>(ticker: &str, existing: &[S]) -> Result<(), TickerError> {
    if ticker.is_empty() {
        return Err(TickerError::Required);
    }
    let length = ticker.chars().count();
    if length < TICKER_MIN_LENGTH {
        return Err(TickerError::TooShort);
    }
    if length > TICKER_MAX_LENGTH {
        return Err(TickerError::TooLong);
    }
    if !ticker.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(TickerError::NotAlphabetic);
    }
    let lowered = ticker.to_ascii_lowercase();
    if existing
        .iter()
        .any(|other| other.as_ref().to_ascii_lowercase() == lowered)
    {
        return Err(TickerError::AlreadyExists);
    }
    Ok(())
}

/// Parses a commission percentage and scales it for the contract:
/// `floor(percent * 100000)`, computed on the exact decimal.
pub fn validate_commission(input: &str) -> Result<u64, ValidationError> {
    let percent = parse_ether(input).map_err(|_| ValidationError::CommissionOutOfRange)?;
    let min = Wei::from_ether(COMMISSION_MIN_PERCENT);
    let max = Wei::from_ether(COMMISSION_MAX_PERCENT);
    if percent < min || percent > max {
        return Err(ValidationError::CommissionOutOfRange);
    }
    let scaled = percent.value() * u128::from(COMMISSION_SCALE) / WEI_PER_ETHER;
    u64::try_from(scaled).map_err(|_| ValidationError::CommissionOutOfRange)
}

/// Commission for network creation, where an empty field means zero.
pub fn optional_commission(input: &str) -> Result<u64, ValidationError> {
    if input.trim().is_empty() {
        return Ok(0);
    }
    validate_commission(input)
}

pub fn validate_dao_address(address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::DaoAddressRequired);
    }
    Ok(())
}

pub fn validate_keystore_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Parses an optional ether amount field. Empty input is `None`.
pub fn parse_amount_field(input: &str) -> Result<Option<Wei>, ValidationError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_ether(input)
        .map(Some)
        .map_err(|_| ValidationError::InvalidAmount)
}

/// Withdrawal rule. Nothing is reported until both fields are present.
pub fn validate_withdraw_amount(
    balance: Option<Wei>,
    amount: Option<Wei>,
    min: Wei,
) -> Option<ValidationError> {
    let (balance, amount) = (balance?, amount?);
    if balance < min || amount > balance {
        return Some(ValidationError::InsufficientBalance);
    }
    if amount < min {
        return Some(ValidationError::BelowMinimum {
            min: format_ether(min),
        });
    }
    None
}

/// Claims only check the amount against the claimable balance.
pub fn validate_claim_amount(balance: Option<Wei>, amount: Option<Wei>) -> Option<ValidationError> {
    let (balance, amount) = (balance?, amount?);
    (amount > balance).then_some(ValidationError::InsufficientBalance)
}

/// Deposits need at least `min` and no more than the wallet holds.
pub fn validate_deposit_amount(
    balance: Wei,
    amount: Wei,
    min: Wei,
) -> Result<(), ValidationError> {
    if amount > balance {
        return Err(ValidationError::InsufficientBalance);
    }
    if amount < min {
        return Err(ValidationError::BelowMinimum {
            min: format_ether(min),
        });
    }
    Ok(())
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of wei in one ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;
/// Decimal places carried by an ether amount.
pub const ETHER_DECIMALS: usize = 18;

/// Errors produced while converting between wei and decimal ether strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The input was empty or whitespace only.
    #[error("amount is empty")]
    Empty,
    /// The input carried a minus sign.
    #[error("amount must not be negative")]
    Negative,
    /// The input contained something other than digits and a single point.
    #[error("invalid amount `{0}`")]
    Invalid(String),
    /// More fractional digits than ether supports.
    #[error("amount `{0}` has more than 18 decimal places")]
    TooManyDecimals(String),
    /// The amount does not fit into 128 bits of wei.
    #[error("amount `{0}` is too large")]
    Overflow(String),
}

/// Amount denominated in wei, the base unit used by the SDK and the subgraph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wei(pub u128);

impl Wei {
    /// Zero wei.
    pub const ZERO: Wei = Wei(0);

    /// Whole ether amount expressed in wei.
    pub const fn from_ether(ether: u64) -> Self {
        Wei(ether as u128 * WEI_PER_ETHER)
    }

    /// Raw wei value.
    pub const fn value(self) -> u128 {
        self.0
    }

    /// Returns `true` when the amount is zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Lossy conversion to a floating point ether value, used for display and
    /// for comparisons the UI performs in ether units.
    pub fn as_ether_f64(self) -> f64 {
        let whole = (self.0 / WEI_PER_ETHER) as f64;
        let fraction = (self.0 % WEI_PER_ETHER) as f64 / WEI_PER_ETHER as f64;
        whole + fraction
    }

    /// Checked addition.
    pub fn checked_add(self, other: Wei) -> Option<Wei> {
        self.0.checked_add(other.0).map(Wei)
    }

    /// Saturating addition.
    pub fn saturating_add(self, other: Wei) -> Wei {
        Wei(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, other: Wei) -> Wei {
        Wei(self.0.saturating_sub(other.0))
    }

    /// Multiplies the amount by a count, saturating on overflow.
    pub fn saturating_mul(self, count: u64) -> Wei {
        Wei(self.0.saturating_mul(u128::from(count)))
    }

    /// Parses a base-10 integer wei string as returned by the subgraph.
    pub fn from_wei_str(value: &str) -> Result<Self, UnitError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(UnitError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(UnitError::Negative);
        }
        if !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(UnitError::Invalid(trimmed.to_string()));
        }
        trimmed
            .parse::<u128>()
            .map(Wei)
            .map_err(|_| UnitError::Overflow(trimmed.to_string()))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_ether(*self))
    }
}

impl FromStr for Wei {
    type Err = UnitError;

    /// Parses a decimal ether string (`"1.5"`) into wei.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_ether(s)
    }
}

/// Formats a wei amount as a decimal ether string.
///
/// The output always carries at least one fractional digit (`1.0`, `0.5`,
/// `0.000000000000000001`) and never carries trailing zeros beyond that.
pub fn format_ether(amount: Wei) -> String {
    let whole = amount.0 / WEI_PER_ETHER;
    let fraction = amount.0 % WEI_PER_ETHER;
    let mut digits = format!("{fraction:0width$}", width = ETHER_DECIMALS);
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    format!("{whole}.{digits}")
}

/// Parses a decimal ether string into wei without going through floating
/// point.
pub fn parse_ether(value: &str) -> Result<Wei, UnitError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(UnitError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(UnitError::Negative);
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitError::Invalid(trimmed.to_string()));
    }
    let digits_only = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(UnitError::Invalid(trimmed.to_string()));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(UnitError::TooManyDecimals(trimmed.to_string()));
    }

    let overflow = || UnitError::Overflow(trimmed.to_string());
    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| overflow())?
            .checked_mul(WEI_PER_ETHER)
            .ok_or_else(overflow)?
    };
    let fraction_wei = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
        padded.parse::<u128>().map_err(|_| overflow())?
    };

    whole_wei
        .checked_add(fraction_wei)
        .map(Wei)
        .ok_or_else(overflow)
}

//! LSD dApp interface contracts.
//!
//! The types in this crate are the serialization friendly payloads shared by
//! the dApp workflows, the subgraph reader and the presentation layer.  They
//! carry no behaviour beyond small invariants (for example a readiness state
//! can never be both banned and ready to stake), which keeps the interface
//! compiling independently of the SDK and transport integrations.

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod telemetry;
mod units;

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use telemetry::{DappAction, DappActionOutcome};
pub use units::{format_ether, parse_ether, UnitError, Wei, ETHER_DECIMALS, WEI_PER_ETHER};

/// Hex encoded account or contract address.
pub type Address = String;

/// Hex encoded BLS public key of a validator.
pub type BlsPublicKey = String;

/// Ether bonded by a node runner per validator.
pub const NODE_RUNNER_BOND: Wei = Wei::from_ether(4);

/// Effective acting identity of the connected user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Account {
    /// Address used for queries and as transaction sender.
    pub address: Address,
    /// Whether the address belongs to a multisig proxy wallet.
    pub is_proxy_account: bool,
}

impl Account {
    /// Account backed directly by a connected wallet.
    pub fn direct(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            is_proxy_account: false,
        }
    }

    /// Account acting through a multisig proxy wallet.
    pub fn proxy(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            is_proxy_account: true,
        }
    }

    /// Lower-cased address, the form the subgraph indexes accounts by.
    pub fn subgraph_id(&self) -> String {
        self.address.to_lowercase()
    }

    /// Abbreviated address for compact display (`0x12...ef`).
    pub fn short_address(&self) -> String {
        abbreviate(&self.address, 4, 2)
    }
}

/// Shortens a hex string to `head` leading and `tail` trailing characters.
pub fn abbreviate(value: &str, head: usize, tail: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= head + tail {
        return value.to_string();
    }
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{start}...{end}")
}

/// Transaction hash as reported by the SDK or the proxy transaction service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Wraps a hash string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Borrow the raw hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared pool a validator draws funding from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FundingPool {
    /// Giant protected staking (savETH) pool.
    SavEth,
    /// Giant fees and MEV pool.
    FeesAndMev,
}

impl FundingPool {
    /// Human readable pool name.
    pub const fn title(self) -> &'static str {
        match self {
            FundingPool::SavEth => "savETH",
            FundingPool::FeesAndMev => "Fees & MEV",
        }
    }
}

/// ETH still missing from each funding pool before a validator can stake.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundingRequirement {
    /// Shortfall in the validator's savETH allocation.
    pub sav_eth_shortfall: Wei,
    /// Shortfall in the validator's fees and MEV allocation.
    pub fees_and_mev_shortfall: Wei,
}

impl FundingRequirement {
    /// Builds a requirement from the two shortfalls.
    pub fn new(sav_eth_shortfall: Wei, fees_and_mev_shortfall: Wei) -> Self {
        Self {
            sav_eth_shortfall,
            fees_and_mev_shortfall,
        }
    }

    /// Both pools are fully funded.
    pub fn is_satisfied(&self) -> bool {
        self.sav_eth_shortfall.is_zero() && self.fees_and_mev_shortfall.is_zero()
    }

    /// Shortfall for the given pool.
    pub fn shortfall(&self, pool: FundingPool) -> Wei {
        match pool {
            FundingPool::SavEth => self.sav_eth_shortfall,
            FundingPool::FeesAndMev => self.fees_and_mev_shortfall,
        }
    }

    /// savETH shortfall in ether units.
    pub fn sav_eth_ether(&self) -> f64 {
        self.sav_eth_shortfall.as_ether_f64()
    }

    /// Fees and MEV shortfall in ether units.
    pub fn fees_and_mev_ether(&self) -> f64 {
        self.fees_and_mev_shortfall.as_ether_f64()
    }
}

/// Ban and readiness signal derived for a validator.
///
/// A banned validator is never ready to stake.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessState {
    is_banned: bool,
    ready_to_stake: bool,
}

impl ReadinessState {
    /// State derived from a successful ban check.
    pub fn from_ban_check(is_banned: bool) -> Self {
        Self {
            is_banned,
            ready_to_stake: !is_banned,
        }
    }

    /// State used when the readiness queries could not complete.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Whether the validator's BLS key is banned in its network.
    pub fn is_banned(&self) -> bool {
        self.is_banned
    }

    /// Whether the validator may proceed to staking.
    pub fn ready_to_stake(&self) -> bool {
        self.ready_to_stake
    }
}

/// LSD network metadata as indexed by the subgraph.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkRecord {
    /// Subgraph entity id.
    pub id: String,
    /// Address of the network's liquid staking manager contract.
    pub liquid_staking_manager: Address,
    /// Network ticker.
    pub ticker: String,
    /// DAO commission scaled by 100 000 (so `20_000` is 0.2%).
    pub commission: u64,
    /// DAO address allowed to administer the network.
    pub dao: Address,
    /// Validators currently being prepared for staking.
    pub validators_prepared_count: u64,
    /// Validators that have already minted derivatives.
    pub minted_derivatives_count: u64,
    /// Fee recipient and syndicate contract, used for node operator rewards.
    pub fee_recipient_and_syndicate: Option<Address>,
}

impl NetworkRecord {
    /// Commission as a percentage.
    pub fn commission_percent(&self) -> f64 {
        self.commission as f64 / COMMISSION_SCALE as f64
    }

    /// Whether `address` is the network's DAO (case-insensitive).
    pub fn is_dao(&self, address: &str) -> bool {
        !self.dao.is_empty() && self.dao.eq_ignore_ascii_case(address)
    }
}

/// Factor applied to commission percentages before they are stored on-chain.
pub const COMMISSION_SCALE: u64 = 100_000;

/// Validator status tracked by the LSD subgraph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValidatorStatus {
    /// Registered with a 4 ETH bond, waiting for pool funding.
    WaitingForEth,
    /// Fully funded and ready for stake submission.
    ReadyToStake,
    /// Staked with the deposit contract.
    Staked,
    /// Derivatives minted for the validator.
    DerivativesMinted,
    /// Validator key banned from its network.
    Banned,
    /// Node runner bond withdrawn.
    Withdrawn,
    /// Status the dApp does not know about.
    Other(String),
}

impl ValidatorStatus {
    /// Canonical subgraph representation.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            ValidatorStatus::WaitingForEth => Cow::Borrowed("WAITING_FOR_ETH"),
            ValidatorStatus::ReadyToStake => Cow::Borrowed("READY_TO_STAKE"),
            ValidatorStatus::Staked => Cow::Borrowed("STAKED"),
            ValidatorStatus::DerivativesMinted => Cow::Borrowed("MINTED_DERIVATIVES"),
            ValidatorStatus::Banned => Cow::Borrowed("BANNED"),
            ValidatorStatus::Withdrawn => Cow::Borrowed("WITHDRAWN"),
            ValidatorStatus::Other(other) => Cow::Borrowed(other.as_str()),
        }
    }
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for ValidatorStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValidatorStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(ValidatorStatus::from(value.as_str()))
    }
}

impl From<&str> for ValidatorStatus {
    fn from(value: &str) -> Self {
        match value {
            "WAITING_FOR_ETH" => ValidatorStatus::WaitingForEth,
            "READY_TO_STAKE" => ValidatorStatus::ReadyToStake,
            "STAKED" => ValidatorStatus::Staked,
            "MINTED_DERIVATIVES" => ValidatorStatus::DerivativesMinted,
            "BANNED" => ValidatorStatus::Banned,
            "WITHDRAWN" => ValidatorStatus::Withdrawn,
            other => ValidatorStatus::Other(other.to_string()),
        }
    }
}

/// Balance a user can withdraw or claim from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WithdrawMode {
    /// Node runner bonds held by a network.
    #[serde(rename = "node_operator")]
    NodeOperator,
    /// Giant protected staking pool.
    #[serde(rename = "staking")]
    Staking,
    /// Giant fees and MEV pool.
    #[serde(rename = "fees")]
    FeesMev,
}

impl WithdrawMode {
    /// All modes in display order.
    pub const ALL: [WithdrawMode; 3] = [
        WithdrawMode::NodeOperator,
        WithdrawMode::Staking,
        WithdrawMode::FeesMev,
    ];

    /// Human readable label rendered next to the balance.
    pub const fn label(self) -> &'static str {
        match self {
            WithdrawMode::NodeOperator => "Node Operator",
            WithdrawMode::Staking => "Protected Staking",
            WithdrawMode::FeesMev => "MEV Staking",
        }
    }
}

/// Deposit entry points offered on the deposit view.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DepositMode {
    /// Landing view listing the three deposit options.
    Main,
    /// Node runner registration with a 4 ETH bond.
    NodeOperator,
    /// Protected staking deposit into the giant savETH pool.
    Staking,
    /// Deposit into the giant fees and MEV pool.
    FeesMev,
}

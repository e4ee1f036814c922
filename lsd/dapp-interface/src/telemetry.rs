use serde::{Deserialize, Serialize};

/// User actions tracked by telemetry collectors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DappAction {
    /// Ban status and funding shortfall lookup for a validator.
    ReadinessCheck,
    /// Funding transaction drawn from the giant savETH pool.
    FundSavEth,
    /// Funding transaction drawn from the giant fees and MEV pool.
    FundFeesAndMev,
    /// Final stake submission with BLS authentication.
    Stake,
    /// Protected staking deposit.
    DepositStaking,
    /// Fees and MEV deposit.
    DepositFeesMev,
    /// Node runner bond deposit.
    DepositNodeRunner,
    /// Reward claim.
    Claim,
    /// Withdrawal from a pool or a node runner bond.
    Withdraw,
    /// Derivative minting.
    Mint,
    /// LSD network deployment.
    CreateNetwork,
    /// Ticker, commission or gatekeeping update.
    UpdateNetwork,
}

impl DappAction {
    /// Stable label attached to emitted counters.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReadinessCheck => "validator.readiness",
            Self::FundSavEth => "validator.fund_sav_eth",
            Self::FundFeesAndMev => "validator.fund_fees_mev",
            Self::Stake => "validator.stake",
            Self::DepositStaking => "deposit.staking",
            Self::DepositFeesMev => "deposit.fees_mev",
            Self::DepositNodeRunner => "deposit.node_runner",
            Self::Claim => "rewards.claim",
            Self::Withdraw => "withdraw",
            Self::Mint => "validator.mint",
            Self::CreateNetwork => "network.create",
            Self::UpdateNetwork => "network.update",
        }
    }
}

/// Result of an observed action.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DappActionOutcome {
    /// Operation succeeded.
    Success,
    /// Operation was rejected before reaching the chain.
    Rejected,
    /// Operation failed.
    Error,
}

impl DappActionOutcome {
    /// Stable label attached to emitted counters.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Rejected => "rejected",
            Self::Error => "err",
        }
    }
}

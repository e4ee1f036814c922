use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lsd_dapp_interface::{Address, FundingPool, TxHash, Wei};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deposit::{DepositEntry, KeystoreObject};
use crate::session::Signer;

/// Errors surfaced by SDK implementations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// The contract reverted; `reason` is the provider's revert string.
    #[error("{reason}")]
    Reverted { reason: String },
    #[error("user rejected the request")]
    Rejected,
    #[error("provider error: {0}")]
    Provider(String),
    /// The keystore could not be decrypted with the supplied password.
    #[error("invalid keystore or password: {0}")]
    InvalidKeystore(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unsupported SDK operation: {0}")]
    Unsupported(String),
}

impl SdkError {
    /// Revert reason suitable for display, when the error carries one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            SdkError::Reverted { reason } => Some(reason.as_str()),
            SdkError::Provider(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// Receipt of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Waits for a submitted transaction to be mined.
#[async_trait]
pub trait ReceiptWaiter: Send + Sync {
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TransactionReceipt, SdkError>;
}

/// Handle returned by every mutating SDK call.
#[derive(Clone)]
pub struct TransactionResult {
    hash: TxHash,
    waiter: Arc<dyn ReceiptWaiter>,
}

impl TransactionResult {
    pub fn new(hash: TxHash, waiter: Arc<dyn ReceiptWaiter>) -> Self {
        Self { hash, waiter }
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    /// Resolves once the transaction has one confirmation. A receipt with
    /// `success == false` is reported as a revert.
    pub async fn wait(&self) -> Result<TransactionReceipt, SdkError> {
        let receipt = self.waiter.wait_for_receipt(&self.hash).await?;
        if !receipt.success {
            return Err(SdkError::Reverted {
                reason: "transaction reverted".into(),
            });
        }
        Ok(receipt)
    }
}

impl fmt::Debug for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionResult")
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// ETH still required from each giant pool, in wei.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsRequired {
    pub sav_eth: Wei,
    pub fees_and_mev: Wei,
}

/// How the connected wallet signs the depositor authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMethod {
    PersonalSign,
    TypedData,
}

/// Signed depositor authorization produced by the connected wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignaturePayload(pub Value);

/// BLS authentication package accepted by the staking contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlsAuthentication(pub Value);

/// Consensus-layer summary used to decide whether minting can be approved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalisedEpochReport {
    pub activation_epoch: u64,
    pub current_checkpoint_epoch: u64,
    /// Active balance in gwei.
    pub active_balance: u64,
}

/// Signed balance report submitted alongside `mint_derivatives`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub report: Value,
    pub deadline: u64,
    pub v: u8,
    pub r: String,
    pub s: String,
}

/// The subset of the LSD wizard SDK consumed by the dApp.
#[async_trait]
pub trait LsdWizard: ReceiptWaiter {
    // Validator lookups.
    async fn lsdn_for_bls_public_key(&self, bls_public_key: &str) -> Result<Address, SdkError>;
    async fn is_bls_public_key_banned(
        &self,
        network: &str,
        bls_public_key: &str,
    ) -> Result<bool, SdkError>;
    async fn funds_required_for_staking(
        &self,
        bls_public_key: &str,
    ) -> Result<FundsRequired, SdkError>;

    // Giant pool funding.
    async fn rotate_funds_back(&self, pool: FundingPool) -> Result<TransactionResult, SdkError>;
    async fn fund_node_operator(
        &self,
        pool: FundingPool,
        network: &str,
        bls_public_key: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError>;

    // Staking.
    async fn deposit_data_from_keystore(
        &self,
        keystore: &KeystoreObject,
    ) -> Result<Vec<DepositEntry>, SdkError>;
    async fn personal_sign_initials(
        &self,
        signer: &dyn Signer,
        bls_public_key: &str,
        bls_signature: &str,
        account: &str,
        method: SigningMethod,
    ) -> Result<SignaturePayload, SdkError>;
    async fn bls_authentication(
        &self,
        keystore: &KeystoreObject,
        deposit: &[DepositEntry],
        payload: &SignaturePayload,
    ) -> Result<BlsAuthentication, SdkError>;
    async fn stake(
        &self,
        network: &str,
        authentication: &BlsAuthentication,
    ) -> Result<TransactionResult, SdkError>;

    // Deposits and balances.
    async fn account_balance(&self, account: &str) -> Result<Wei, SdkError>;
    async fn deposit_eth(&self, pool: FundingPool, amount: Wei)
        -> Result<TransactionResult, SdkError>;
    async fn deposit_eth_by_node_runner(
        &self,
        network: &str,
        bls_public_key: &str,
        bls_signature: &str,
        eoa_representative: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError>;
    /// Giant pool LP balance held by `account`.
    async fn pool_balance(&self, pool: FundingPool, account: &str) -> Result<Wei, SdkError>;

    // Withdrawals.
    async fn withdraw_eth(&self, pool: FundingPool, amount: Wei)
        -> Result<TransactionResult, SdkError>;
    async fn withdraw_eth_for_knot(
        &self,
        network: &str,
        recipient: &str,
        bls_public_key: &str,
    ) -> Result<TransactionResult, SdkError>;

    // Rewards.
    async fn last_interacted_timestamp(
        &self,
        account: &str,
        lp_token: &str,
    ) -> Result<u64, SdkError>;
    async fn is_eligible_to_interact_with_giant_lp_token(
        &self,
        timestamp: u64,
    ) -> Result<bool, SdkError>;
    async fn protected_staking_rewards(&self, account: &str) -> Result<Wei, SdkError>;
    async fn preview_fees_and_mev_rewards(&self, account: &str) -> Result<Wei, SdkError>;
    async fn preview_node_operator_rewards(
        &self,
        syndicate: &str,
        network: &str,
        account: &str,
        smart_wallet: &str,
    ) -> Result<Wei, SdkError>;
    async fn claim_protected_staking_rewards(
        &self,
        recipient: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError>;
    async fn claim_fees_and_mev_rewards(
        &self,
        recipient: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError>;
    async fn claim_rewards_as_node_runner(
        &self,
        network: &str,
        recipient: &str,
        bls_public_keys: &[String],
    ) -> Result<TransactionResult, SdkError>;

    // Minting.
    async fn finalised_epoch_report(
        &self,
        bls_public_key: &str,
    ) -> Result<FinalisedEpochReport, SdkError>;
    async fn report_balance(&self, bls_public_key: &str) -> Result<BalanceReport, SdkError>;
    async fn mint_derivatives(
        &self,
        network: &str,
        bls_public_key: &str,
        report: &BalanceReport,
    ) -> Result<TransactionResult, SdkError>;

    // Network administration. Commissions are already scaled by 100 000.
    async fn deploy_network(
        &self,
        dao: &str,
        ticker: &str,
        commission: u64,
        gatekeeping: bool,
    ) -> Result<TransactionResult, SdkError>;
    async fn update_ticker(&self, network: &str, ticker: &str)
        -> Result<TransactionResult, SdkError>;
    async fn update_commission(
        &self,
        network: &str,
        commission: u64,
    ) -> Result<TransactionResult, SdkError>;
    async fn update_whitelisting(
        &self,
        network: &str,
        enabled: bool,
    ) -> Result<TransactionResult, SdkError>;
}

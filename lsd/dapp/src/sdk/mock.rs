use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lsd_dapp_interface::{Address, FundingPool, TxHash, Wei};
use serde_json::json;

use super::{
    BalanceReport, BlsAuthentication, FinalisedEpochReport, FundsRequired, LsdWizard,
    ReceiptWaiter, SdkError, SignaturePayload, SigningMethod, TransactionReceipt,
    TransactionResult,
};
use crate::deposit::{DepositEntry, KeystoreObject};
use crate::session::Signer;

/// A recorded SDK invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdkCall {
    pub method: &'static str,
    pub args: Vec<String>,
}

#[derive(Default)]
struct State {
    networks: HashMap<String, Address>,
    banned: HashSet<String>,
    funds: HashMap<String, FundsRequired>,
    deposit_data: Option<Vec<DepositEntry>>,
    account_balances: HashMap<String, Wei>,
    pool_balances: HashMap<FundingPool, Wei>,
    ineligible: bool,
    last_interacted: u64,
    protected_staking_rewards: Wei,
    fees_and_mev_rewards: Wei,
    node_operator_rewards: HashMap<String, Wei>,
    epoch_report: Option<FinalisedEpochReport>,
    balance_report: Option<BalanceReport>,
    failures: HashMap<&'static str, SdkError>,
    latencies: HashMap<&'static str, VecDeque<Duration>>,
    calls: Vec<SdkCall>,
    submitted: u64,
}

/// Scriptable in-memory SDK that records every call.
#[derive(Clone, Default)]
pub struct MockWizard {
    state: Arc<Mutex<State>>,
}

impl MockWizard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_network(self, bls_public_key: &str, network: &str) -> Self {
        self.lock_state()
            .networks
            .insert(bls_public_key.to_string(), network.to_string());
        self
    }

    pub fn with_funds(self, bls_public_key: &str, funds: FundsRequired) -> Self {
        self.set_funds(bls_public_key, funds);
        self
    }

    pub fn set_funds(&self, bls_public_key: &str, funds: FundsRequired) {
        self.lock_state()
            .funds
            .insert(bls_public_key.to_string(), funds);
    }

    pub fn ban(&self, bls_public_key: &str) {
        self.lock_state().banned.insert(bls_public_key.to_string());
    }

    pub fn set_deposit_data(&self, entries: Vec<DepositEntry>) {
        self.lock_state().deposit_data = Some(entries);
    }

    pub fn set_account_balance(&self, account: &str, balance: Wei) {
        self.lock_state()
            .account_balances
            .insert(account.to_lowercase(), balance);
    }

    pub fn set_pool_balance(&self, pool: FundingPool, balance: Wei) {
        self.lock_state().pool_balances.insert(pool, balance);
    }

    pub fn set_eligible(&self, eligible: bool) {
        self.lock_state().ineligible = !eligible;
    }

    pub fn set_last_interacted(&self, timestamp: u64) {
        self.lock_state().last_interacted = timestamp;
    }

    pub fn set_protected_staking_rewards(&self, amount: Wei) {
        self.lock_state().protected_staking_rewards = amount;
    }

    pub fn set_fees_and_mev_rewards(&self, amount: Wei) {
        self.lock_state().fees_and_mev_rewards = amount;
    }

    pub fn set_node_operator_rewards(&self, network: &str, amount: Wei) {
        self.lock_state()
            .node_operator_rewards
            .insert(network.to_string(), amount);
    }

    pub fn set_epoch_report(&self, report: FinalisedEpochReport) {
        self.lock_state().epoch_report = Some(report);
    }

    pub fn set_balance_report(&self, report: BalanceReport) {
        self.lock_state().balance_report = Some(report);
    }

    /// Makes every later call to `method` fail with `error`.
    pub fn fail(&self, method: &'static str, error: SdkError) {
        self.lock_state().failures.insert(method, error);
    }

    pub fn clear_failure(&self, method: &'static str) {
        self.lock_state().failures.remove(method);
    }

    /// Delays the next call to `method` by `latency`.
    pub fn push_latency(&self, method: &'static str, latency: Duration) {
        self.lock_state()
            .latencies
            .entry(method)
            .or_default()
            .push_back(latency);
    }

    pub fn calls(&self) -> Vec<SdkCall> {
        self.lock_state().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<SdkCall> {
        self.lock_state()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    pub fn called(&self, method: &str) -> bool {
        !self.calls_to(method).is_empty()
    }

    /// Number of transactions handed out so far.
    pub fn submitted_transactions(&self) -> u64 {
        self.lock_state().submitted
    }

    async fn enter(&self, method: &'static str, args: Vec<String>) -> Result<(), SdkError> {
        let latency = {
            let mut state = self.lock_state();
            state.calls.push(SdkCall { method, args });
            state
                .latencies
                .get_mut(method)
                .and_then(|queue| queue.pop_front())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.lock_state().failures.get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn transaction(&self) -> TransactionResult {
        let nonce = {
            let mut state = self.lock_state();
            state.submitted += 1;
            state.submitted
        };
        TransactionResult::new(
            TxHash::new(format!("0x{nonce:064x}")),
            Arc::new(self.clone()),
        )
    }

    async fn submit(
        &self,
        method: &'static str,
        args: Vec<String>,
    ) -> Result<TransactionResult, SdkError> {
        self.enter(method, args).await?;
        Ok(self.transaction())
    }
}

fn pool_name(pool: FundingPool) -> String {
    match pool {
        FundingPool::SavEth => "sav_eth".into(),
        FundingPool::FeesAndMev => "fees_and_mev".into(),
    }
}

#[async_trait]
impl ReceiptWaiter for MockWizard {
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TransactionReceipt, SdkError> {
        self.enter("wait_for_receipt", vec![hash.to_string()]).await?;
        Ok(TransactionReceipt {
            hash: hash.clone(),
            block_number: Some(1),
            success: true,
        })
    }
}

#[async_trait]
impl LsdWizard for MockWizard {
    async fn lsdn_for_bls_public_key(&self, bls_public_key: &str) -> Result<Address, SdkError> {
        self.enter("lsdn_for_bls_public_key", vec![bls_public_key.into()])
            .await?;
        self.lock_state()
            .networks
            .get(bls_public_key)
            .cloned()
            .ok_or_else(|| SdkError::NotFound(format!("network for {bls_public_key}")))
    }

    async fn is_bls_public_key_banned(
        &self,
        network: &str,
        bls_public_key: &str,
    ) -> Result<bool, SdkError> {
        self.enter(
            "is_bls_public_key_banned",
            vec![network.into(), bls_public_key.into()],
        )
        .await?;
        Ok(self.lock_state().banned.contains(bls_public_key))
    }

    async fn funds_required_for_staking(
        &self,
        bls_public_key: &str,
    ) -> Result<FundsRequired, SdkError> {
        self.enter("funds_required_for_staking", vec![bls_public_key.into()])
            .await?;
        Ok(self
            .lock_state()
            .funds
            .get(bls_public_key)
            .copied()
            .unwrap_or_default())
    }

    async fn rotate_funds_back(&self, pool: FundingPool) -> Result<TransactionResult, SdkError> {
        self.submit("rotate_funds_back", vec![pool_name(pool)]).await
    }

    async fn fund_node_operator(
        &self,
        pool: FundingPool,
        network: &str,
        bls_public_key: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "fund_node_operator",
            vec![
                pool_name(pool),
                network.into(),
                bls_public_key.into(),
                amount.value().to_string(),
            ],
        )
        .await
    }

    async fn deposit_data_from_keystore(
        &self,
        keystore: &KeystoreObject,
    ) -> Result<Vec<DepositEntry>, SdkError> {
        let pubkey = keystore.pubkey().unwrap_or_default().to_string();
        self.enter("deposit_data_from_keystore", vec![pubkey]).await?;
        self.lock_state()
            .deposit_data
            .clone()
            .ok_or_else(|| SdkError::InvalidKeystore("no deposit data scripted".into()))
    }

    async fn personal_sign_initials(
        &self,
        signer: &dyn Signer,
        bls_public_key: &str,
        bls_signature: &str,
        account: &str,
        method: SigningMethod,
    ) -> Result<SignaturePayload, SdkError> {
        self.enter(
            "personal_sign_initials",
            vec![
                bls_public_key.into(),
                bls_signature.into(),
                account.into(),
                format!("{method:?}"),
            ],
        )
        .await?;
        let signature = match method {
            SigningMethod::PersonalSign => signer.sign_message(bls_public_key.as_bytes()).await,
            SigningMethod::TypedData => {
                signer
                    .sign_typed_data(&json!({ "blsPublicKey": bls_public_key }))
                    .await
            }
        }
        .map_err(|err| SdkError::Provider(err.to_string()))?;
        Ok(SignaturePayload(json!({
            "signature": signature,
            "account": account,
        })))
    }

    async fn bls_authentication(
        &self,
        keystore: &KeystoreObject,
        deposit: &[DepositEntry],
        payload: &SignaturePayload,
    ) -> Result<BlsAuthentication, SdkError> {
        let pubkey = keystore.pubkey().unwrap_or_default().to_string();
        self.enter("bls_authentication", vec![pubkey, deposit.len().to_string()])
            .await?;
        Ok(BlsAuthentication(json!({
            "depositor": payload.0,
            "validators": deposit.len(),
        })))
    }

    async fn stake(
        &self,
        network: &str,
        _authentication: &BlsAuthentication,
    ) -> Result<TransactionResult, SdkError> {
        self.submit("stake", vec![network.into()]).await
    }

    async fn account_balance(&self, account: &str) -> Result<Wei, SdkError> {
        self.enter("account_balance", vec![account.into()]).await?;
        Ok(self
            .lock_state()
            .account_balances
            .get(&account.to_lowercase())
            .copied()
            .unwrap_or_default())
    }

    async fn deposit_eth(
        &self,
        pool: FundingPool,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "deposit_eth",
            vec![pool_name(pool), amount.value().to_string()],
        )
        .await
    }

    async fn deposit_eth_by_node_runner(
        &self,
        network: &str,
        bls_public_key: &str,
        bls_signature: &str,
        eoa_representative: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "deposit_eth_by_node_runner",
            vec![
                network.into(),
                bls_public_key.into(),
                bls_signature.into(),
                eoa_representative.into(),
                amount.value().to_string(),
            ],
        )
        .await
    }

    async fn pool_balance(&self, pool: FundingPool, account: &str) -> Result<Wei, SdkError> {
        self.enter("pool_balance", vec![pool_name(pool), account.into()])
            .await?;
        Ok(self
            .lock_state()
            .pool_balances
            .get(&pool)
            .copied()
            .unwrap_or_default())
    }

    async fn withdraw_eth(
        &self,
        pool: FundingPool,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "withdraw_eth",
            vec![pool_name(pool), amount.value().to_string()],
        )
        .await
    }

    async fn withdraw_eth_for_knot(
        &self,
        network: &str,
        recipient: &str,
        bls_public_key: &str,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "withdraw_eth_for_knot",
            vec![network.into(), recipient.into(), bls_public_key.into()],
        )
        .await
    }

    async fn last_interacted_timestamp(
        &self,
        account: &str,
        lp_token: &str,
    ) -> Result<u64, SdkError> {
        self.enter(
            "last_interacted_timestamp",
            vec![account.into(), lp_token.into()],
        )
        .await?;
        Ok(self.lock_state().last_interacted)
    }

    async fn is_eligible_to_interact_with_giant_lp_token(
        &self,
        timestamp: u64,
    ) -> Result<bool, SdkError> {
        self.enter(
            "is_eligible_to_interact_with_giant_lp_token",
            vec![timestamp.to_string()],
        )
        .await?;
        Ok(!self.lock_state().ineligible)
    }

    async fn protected_staking_rewards(&self, account: &str) -> Result<Wei, SdkError> {
        self.enter("protected_staking_rewards", vec![account.into()])
            .await?;
        Ok(self.lock_state().protected_staking_rewards)
    }

    async fn preview_fees_and_mev_rewards(&self, account: &str) -> Result<Wei, SdkError> {
        self.enter("preview_fees_and_mev_rewards", vec![account.into()])
            .await?;
        Ok(self.lock_state().fees_and_mev_rewards)
    }

    async fn preview_node_operator_rewards(
        &self,
        syndicate: &str,
        network: &str,
        account: &str,
        smart_wallet: &str,
    ) -> Result<Wei, SdkError> {
        self.enter(
            "preview_node_operator_rewards",
            vec![
                syndicate.into(),
                network.into(),
                account.into(),
                smart_wallet.into(),
            ],
        )
        .await?;
        Ok(self
            .lock_state()
            .node_operator_rewards
            .get(network)
            .copied()
            .unwrap_or_default())
    }

    async fn claim_protected_staking_rewards(
        &self,
        recipient: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "claim_protected_staking_rewards",
            vec![recipient.into(), amount.value().to_string()],
        )
        .await
    }

    async fn claim_fees_and_mev_rewards(
        &self,
        recipient: &str,
        amount: Wei,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "claim_fees_and_mev_rewards",
            vec![recipient.into(), amount.value().to_string()],
        )
        .await
    }

    async fn claim_rewards_as_node_runner(
        &self,
        network: &str,
        recipient: &str,
        bls_public_keys: &[String],
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "claim_rewards_as_node_runner",
            vec![network.into(), recipient.into(), bls_public_keys.join(",")],
        )
        .await
    }

    async fn finalised_epoch_report(
        &self,
        bls_public_key: &str,
    ) -> Result<FinalisedEpochReport, SdkError> {
        self.enter("finalised_epoch_report", vec![bls_public_key.into()])
            .await?;
        self.lock_state()
            .epoch_report
            .ok_or_else(|| SdkError::NotFound(format!("epoch report for {bls_public_key}")))
    }

    async fn report_balance(&self, bls_public_key: &str) -> Result<BalanceReport, SdkError> {
        self.enter("report_balance", vec![bls_public_key.into()])
            .await?;
        self.lock_state()
            .balance_report
            .clone()
            .ok_or_else(|| SdkError::NotFound(format!("balance report for {bls_public_key}")))
    }

    async fn mint_derivatives(
        &self,
        network: &str,
        bls_public_key: &str,
        report: &BalanceReport,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "mint_derivatives",
            vec![
                network.into(),
                bls_public_key.into(),
                report.deadline.to_string(),
            ],
        )
        .await
    }

    async fn deploy_network(
        &self,
        dao: &str,
        ticker: &str,
        commission: u64,
        gatekeeping: bool,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "deploy_network",
            vec![
                dao.into(),
                ticker.into(),
                commission.to_string(),
                gatekeeping.to_string(),
            ],
        )
        .await
    }

    async fn update_ticker(
        &self,
        network: &str,
        ticker: &str,
    ) -> Result<TransactionResult, SdkError> {
        self.submit("update_ticker", vec![network.into(), ticker.into()])
            .await
    }

    async fn update_commission(
        &self,
        network: &str,
        commission: u64,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "update_commission",
            vec![network.into(), commission.to_string()],
        )
        .await
    }

    async fn update_whitelisting(
        &self,
        network: &str,
        enabled: bool,
    ) -> Result<TransactionResult, SdkError> {
        self.submit(
            "update_whitelisting",
            vec![network.into(), enabled.to_string()],
        )
        .await
    }
}

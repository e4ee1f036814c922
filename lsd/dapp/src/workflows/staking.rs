//! The stake wizard end to end: readiness, funding, approval and the
//! explorer link, driven through [`StakeFlow`].
//!
//! Every operation catches its own error, moves the flow to
//! [`StakeStep::Failed`](super::StakeStep::Failed) with the user-facing
//! message and returns the error to the caller.

use lsd_dapp_interface::{BlsPublicKey, FundingPool, TxHash};
use serde_json::Value;
use tracing::{debug, info};

use super::{
    connected, FundingDispatcher, FundingError, Precondition, ReadinessEvaluator,
    ReadinessReport, StakeError, StakeFlow, StakeRequest, StakeStep, StakeSubmitter,
    TransactionOutcome, TransitionError,
};
use crate::deposit::{strip_0x, DepositError, DepositObject, KeystoreObject};
use crate::error_map::{describe_stake_workflow, ErrorDescription};
use crate::sdk::TransactionResult;
use crate::services::DappServices;
use crate::session::Session;
use crate::tx_link::TransactionLinkResolver;

/// Anything that stops the stake wizard; each variant maps to a user message
/// through [`describe_stake_workflow`].
#[derive(Debug, thiserror::Error)]
pub enum StakeWorkflowError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Deposit(#[from] DepositError),
    #[error(transparent)]
    Funding(#[from] FundingError),
    #[error(transparent)]
    Stake(#[from] StakeError),
    #[error("Select a validator to stake first.")]
    NotOpened,
    #[error("This validator is banned and cannot be staked.")]
    Banned,
    #[error("The validator status could not be loaded. Please try again.")]
    ReadinessUnknown,
    #[error("The deposit file does not belong to the selected validator.")]
    DepositMismatch { expected: String, found: String },
}

fn same_key(left: &str, right: &str) -> bool {
    strip_0x(left).eq_ignore_ascii_case(strip_0x(right))
}

/// Stake wizard for one validator at a time.
pub struct StakeWorkflow {
    readiness: ReadinessEvaluator,
    funding: FundingDispatcher,
    submitter: StakeSubmitter,
    links: TransactionLinkResolver,
    withdrawal_credentials: String,
    bls_public_key: Option<BlsPublicKey>,
    flow: StakeFlow,
    pending: Option<TransactionResult>,
    outcome: Option<TransactionOutcome>,
    failure: Option<ErrorDescription>,
}

impl StakeWorkflow {
    /// Builds an idle wizard from the shared services.
    pub fn new(services: &DappServices) -> Self {
        Self {
            readiness: ReadinessEvaluator::new(services.telemetry.clone()),
            funding: FundingDispatcher::new(services.telemetry.clone()),
            submitter: StakeSubmitter::new(services.telemetry.clone()),
            links: services.links.clone(),
            withdrawal_credentials: services.limits.withdrawal_credentials.clone(),
            bls_public_key: None,
            flow: StakeFlow::new(),
            pending: None,
            outcome: None,
            failure: None,
        }
    }

    /// Current wizard state.
    pub fn flow(&self) -> &StakeFlow {
        &self.flow
    }

    /// Evaluator holding the latest committed readiness report.
    pub fn readiness(&self) -> &ReadinessEvaluator {
        &self.readiness
    }

    /// Validator the wizard was opened for.
    pub fn bls_public_key(&self) -> Option<&str> {
        self.bls_public_key.as_deref()
    }

    /// Message for the most recent failure, cleared by `retry` and `open`.
    pub fn failure(&self) -> Option<&ErrorDescription> {
        self.failure.as_ref()
    }

    /// Explorer link of the confirmed stake transaction.
    pub fn link(&self) -> Option<&str> {
        self.outcome
            .as_ref()
            .and_then(|outcome| outcome.explorer_link.as_deref())
    }

    /// Hash and explorer link of the confirmed stake.
    pub fn outcome(&self) -> Option<&TransactionOutcome> {
        self.outcome.as_ref()
    }

    /// Starts the wizard for `bls_public_key` from a clean state and polls
    /// its readiness.
    pub async fn open(
        &mut self,
        session: &Session,
        bls_public_key: &str,
    ) -> Result<ReadinessReport, StakeWorkflowError> {
        self.dismiss();
        self.bls_public_key = Some(bls_public_key.to_string());
        let result = self.poll(session).await;
        self.record(result)
    }

    /// Re-polls readiness for the open validator. Fresh shortfalls replace
    /// the ones the flow holds while it is funding or awaiting the keystore.
    pub async fn refresh(
        &mut self,
        session: &Session,
    ) -> Result<ReadinessReport, StakeWorkflowError> {
        let report = self.poll(session).await?;
        self.apply_report(&report)?;
        Ok(report)
    }

    fn apply_report(&mut self, report: &ReadinessReport) -> Result<(), TransitionError> {
        let refreshable = matches!(
            self.flow.step(),
            StakeStep::FundingSavEth | StakeStep::FundingFeesMev | StakeStep::AwaitingKeystore
        );
        match report.funds {
            Some(funds) if refreshable && !report.superseded => {
                self.flow.funding_refreshed(funds)?;
                debug!(step = %self.flow.step(), "funding refreshed");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn poll(&self, session: &Session) -> Result<ReadinessReport, StakeWorkflowError> {
        let bls_public_key = self
            .bls_public_key
            .as_deref()
            .ok_or(StakeWorkflowError::NotOpened)?;
        let sdk = session.sdk().ok_or(Precondition::SdkUnavailable)?;
        Ok(self.readiness.check(sdk.as_ref(), bls_public_key).await)
    }

    /// Accepts the deposit file and moves to the first funding step that
    /// still has a shortfall.
    pub async fn upload_deposit(
        &mut self,
        session: &Session,
        deposit: DepositObject,
    ) -> Result<(), StakeWorkflowError> {
        let result = self.accept_deposit(session, deposit).await;
        self.record(result)
    }

    async fn accept_deposit(
        &mut self,
        session: &Session,
        deposit: DepositObject,
    ) -> Result<(), StakeWorkflowError> {
        let expected = self
            .bls_public_key
            .clone()
            .ok_or(StakeWorkflowError::NotOpened)?;
        let found = &deposit.primary().pubkey;
        if !same_key(&expected, found) {
            return Err(StakeWorkflowError::DepositMismatch {
                expected,
                found: found.clone(),
            });
        }
        deposit.validate_credentials(&self.withdrawal_credentials)?;

        let report = match self.readiness.snapshot() {
            Some(report) => report,
            None => self.poll(session).await?,
        };
        if report.state.is_banned() {
            return Err(StakeWorkflowError::Banned);
        }
        let funding = match (report.ready_to_stake(), report.funds) {
            (true, Some(funding)) => funding,
            _ => return Err(StakeWorkflowError::ReadinessUnknown),
        };

        self.flow.deposit_uploaded(deposit)?;
        self.flow.funds_evaluated(funding)?;
        debug!(step = %self.flow.step(), "deposit accepted");
        Ok(())
    }

    /// Funds the shortfall of `pool`, then re-polls readiness.
    pub async fn fund(
        &mut self,
        session: &Session,
        pool: FundingPool,
    ) -> Result<ReadinessReport, StakeWorkflowError> {
        let result = self.fund_pool(session, pool).await;
        self.record(result)
    }

    async fn fund_pool(
        &mut self,
        session: &Session,
        pool: FundingPool,
    ) -> Result<ReadinessReport, StakeWorkflowError> {
        if !self.flow.can_fund(pool) {
            return Err(TransitionError {
                from: self.flow.step(),
                action: "fund this pool",
            }
            .into());
        }
        let bls_public_key = self
            .bls_public_key
            .clone()
            .ok_or(StakeWorkflowError::NotOpened)?;
        let shortfall = self
            .flow
            .funding()
            .map(|funding| funding.shortfall(pool))
            .unwrap_or_default();

        self.funding
            .fund(session, &bls_public_key, shortfall, pool)
            .await?
            .ok_or(Precondition::SdkUnavailable)?;
        match pool {
            FundingPool::SavEth => self.flow.sav_eth_funded()?,
            FundingPool::FeesAndMev => self.flow.fees_and_mev_funded()?,
        }
        self.refresh(session).await
    }

    /// Decrypts the keystore with `password`, submits the stake and waits for
    /// confirmation.
    pub async fn approve(
        &mut self,
        session: &Session,
        keystore: Value,
        password: &str,
    ) -> Result<TransactionOutcome, StakeWorkflowError> {
        self.submit_stake(session, keystore, password).await?;
        self.await_confirmation(session).await
    }

    /// Submits the stake and leaves the flow in `AwaitingConfirmation`.
    /// Finish with [`await_confirmation`](Self::await_confirmation).
    pub async fn submit_stake(
        &mut self,
        session: &Session,
        keystore: Value,
        password: &str,
    ) -> Result<TxHash, StakeWorkflowError> {
        let result = self.submit(session, keystore, password).await;
        self.record(result)
    }

    async fn submit(
        &mut self,
        session: &Session,
        keystore: Value,
        password: &str,
    ) -> Result<TxHash, StakeWorkflowError> {
        connected(session)?;
        let keystore = KeystoreObject::new(keystore, password)?;
        self.flow.keystore_supplied(keystore)?;

        let transaction = {
            let (Some(funding), Some(deposit), Some(keystore)) =
                (self.flow.funding(), self.flow.deposit(), self.flow.keystore())
            else {
                return Err(TransitionError {
                    from: self.flow.step(),
                    action: "submit the stake",
                }
                .into());
            };
            self.submitter
                .submit(
                    session,
                    StakeRequest {
                        funding,
                        deposit,
                        keystore,
                        withdrawal_credentials: &self.withdrawal_credentials,
                    },
                )
                .await?
        };

        let hash = transaction.hash().clone();
        self.flow.approval_submitted(hash.clone())?;
        self.pending = Some(transaction);
        info!(hash = %hash, "stake submitted");
        Ok(hash)
    }

    /// Waits for the submitted stake to confirm and resolves its explorer
    /// link.
    pub async fn await_confirmation(
        &mut self,
        session: &Session,
    ) -> Result<TransactionOutcome, StakeWorkflowError> {
        let result = self.confirm(session).await;
        self.record(result)
    }

    async fn confirm(&mut self, session: &Session) -> Result<TransactionOutcome, StakeWorkflowError> {
        let (account, _) = connected(session)?;
        let transaction = self.pending.clone().ok_or(TransitionError {
            from: self.flow.step(),
            action: "wait for confirmation",
        })?;
        transaction.wait().await.map_err(StakeError::submission)?;
        self.flow.confirmed()?;
        self.pending = None;

        let explorer_link = self.links.resolve(account, transaction.hash()).await;
        info!(hash = %transaction.hash(), "stake confirmed");
        let outcome = TransactionOutcome {
            hash: transaction.hash().clone(),
            explorer_link,
        };
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Leaves `Failed` for a fresh upload step. The validator stays selected.
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        self.flow.retry()?;
        self.pending = None;
        self.failure = None;
        self.readiness.reset();
        Ok(())
    }

    /// Closes the wizard and forgets everything it collected.
    pub fn dismiss(&mut self) {
        self.flow.dismiss();
        self.readiness.reset();
        self.bls_public_key = None;
        self.pending = None;
        self.outcome = None;
        self.failure = None;
    }

    fn record<T>(&mut self, result: Result<T, StakeWorkflowError>) -> Result<T, StakeWorkflowError> {
        if let Err(err) = &result {
            let description = describe_stake_workflow(err);
            if let Err(transition) = self.flow.fail(description.headline.clone()) {
                debug!(error = %transition, "flow already settled");
            }
            self.failure = Some(description);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lsd_dapp_interface::{Account, Wei};

    use super::*;
    use crate::config::DappConfig;
    use crate::deposit::fixtures::{entry, CREDENTIALS, PUBKEY};
    use crate::sdk::{FundsRequired, MockWizard, SdkError};
    use crate::session::{ConnectorKind, MockSigner};
    use crate::subgraph::StaticSubgraph;
    use crate::tx_link::MockProxyService;
    use crate::workflows::StakeStep;

    fn workflow() -> StakeWorkflow {
        let mut config = DappConfig::default();
        config.staking.withdrawal_credentials = CREDENTIALS.to_string();
        let services = DappServices::new(
            &config,
            Arc::new(StaticSubgraph::default()),
            Arc::new(MockProxyService::default()),
        )
        .unwrap();
        StakeWorkflow::new(&services)
    }

    fn wizard(funds: FundsRequired) -> MockWizard {
        let sdk = MockWizard::new()
            .with_network(PUBKEY, "0xlsm")
            .with_funds(PUBKEY, funds);
        sdk.set_deposit_data(vec![entry(CREDENTIALS)]);
        sdk
    }

    fn session(sdk: &MockWizard) -> Session {
        Session::new(
            Account::direct("0xabc"),
            ConnectorKind::Injected,
            Arc::new(MockSigner::new(ConnectorKind::Injected, "0xabc")),
            Arc::new(sdk.clone()),
        )
    }

    fn deposit() -> DepositObject {
        DepositObject::from_entries(vec![entry(CREDENTIALS)]).unwrap()
    }

    fn keystore_material() -> Value {
        serde_json::json!({ "crypto": {}, "pubkey": PUBKEY })
    }

    #[tokio::test]
    async fn funded_validator_goes_straight_to_the_keystore() {
        let sdk = wizard(FundsRequired::default());
        let session = session(&sdk);
        let mut workflow = workflow();

        let report = workflow.open(&session, PUBKEY).await.unwrap();
        assert!(report.can_submit_stake());
        workflow.upload_deposit(&session, deposit()).await.unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::AwaitingKeystore);

        let outcome = workflow
            .approve(&session, keystore_material(), "correct horse")
            .await
            .unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::Success);
        assert!(workflow.flow().keystore().is_none());
        assert_eq!(workflow.link(), outcome.explorer_link.as_deref());
        assert!(sdk.called("stake"));
    }

    #[tokio::test]
    async fn funds_both_pools_in_order() {
        let sdk = wizard(FundsRequired {
            sav_eth: Wei::from_ether(24),
            fees_and_mev: Wei::from_ether(4),
        });
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::FundingSavEth);
        assert!(!workflow.flow().can_fund_fees_and_mev());

        workflow.fund(&session, FundingPool::SavEth).await.unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::FundingFeesMev);

        sdk.set_funds(PUBKEY, FundsRequired::default());
        let report = workflow
            .fund(&session, FundingPool::FeesAndMev)
            .await
            .unwrap();
        assert!(report.can_submit_stake());
        assert_eq!(workflow.flow().step(), StakeStep::AwaitingKeystore);

        let funded: Vec<_> = sdk
            .calls_to("fund_node_operator")
            .into_iter()
            .map(|call| call.args[0].clone())
            .collect();
        assert_eq!(funded, vec!["sav_eth", "fees_and_mev"]);
    }

    #[tokio::test]
    async fn single_pool_funding_unblocks_the_stake() {
        let sdk = wizard(FundsRequired {
            sav_eth: Wei::from_ether(24),
            fees_and_mev: Wei::ZERO,
        });
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        sdk.set_funds(PUBKEY, FundsRequired::default());
        let report = workflow.fund(&session, FundingPool::SavEth).await.unwrap();
        assert!(report.can_submit_stake());
        assert!(workflow.flow().funding().unwrap().is_satisfied());

        workflow
            .approve(&session, keystore_material(), "correct horse")
            .await
            .unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::Success);
        assert!(sdk.called("stake"));
    }

    #[tokio::test]
    async fn both_pools_are_funded_from_fresh_shortfalls_then_staked() {
        let sdk = wizard(FundsRequired {
            sav_eth: Wei::from_ether(24),
            fees_and_mev: Wei::from_ether(4),
        });
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        // Part of the fees and MEV shortfall was covered meanwhile.
        sdk.set_funds(
            PUBKEY,
            FundsRequired {
                sav_eth: Wei::ZERO,
                fees_and_mev: Wei::from_ether(2),
            },
        );
        workflow.fund(&session, FundingPool::SavEth).await.unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::FundingFeesMev);

        sdk.set_funds(PUBKEY, FundsRequired::default());
        workflow
            .fund(&session, FundingPool::FeesAndMev)
            .await
            .unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::AwaitingKeystore);

        workflow
            .approve(&session, keystore_material(), "correct horse")
            .await
            .unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::Success);
        assert_eq!(sdk.calls_to("stake").len(), 1);

        let amounts: Vec<_> = sdk
            .calls_to("fund_node_operator")
            .into_iter()
            .map(|call| call.args[3].clone())
            .collect();
        assert_eq!(
            amounts,
            vec![
                Wei::from_ether(24).value().to_string(),
                Wei::from_ether(2).value().to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pending_receipts_hold_the_flow_in_awaiting_confirmation() {
        let sdk = wizard(FundsRequired::default());
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        sdk.push_latency("wait_for_receipt", Duration::from_secs(60));
        let pending = tokio::time::timeout(
            Duration::from_secs(1),
            workflow.approve(&session, keystore_material(), "correct horse"),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(workflow.flow().step(), StakeStep::AwaitingConfirmation);
        assert!(workflow.flow().transaction().is_some());
        assert!(workflow.outcome().is_none());

        let outcome = workflow.await_confirmation(&session).await.unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::Success);
        assert_eq!(Some(&outcome.hash), workflow.flow().transaction());
    }

    #[tokio::test]
    async fn failed_confirmation_fails_the_flow() {
        let sdk = wizard(FundsRequired::default());
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        workflow
            .submit_stake(&session, keystore_material(), "correct horse")
            .await
            .unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::AwaitingConfirmation);

        sdk.fail(
            "wait_for_receipt",
            SdkError::Provider("receipt timed out".into()),
        );
        workflow.await_confirmation(&session).await.unwrap_err();
        assert_eq!(workflow.flow().step(), StakeStep::Failed);
        assert_eq!(workflow.flow().error(), Some("Receipt timed out"));
        assert!(workflow.link().is_none());
    }

    #[tokio::test]
    async fn out_of_order_funding_fails_the_flow() {
        let sdk = wizard(FundsRequired {
            sav_eth: Wei::from_ether(24),
            fees_and_mev: Wei::from_ether(4),
        });
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        let err = workflow
            .fund(&session, FundingPool::FeesAndMev)
            .await
            .unwrap_err();
        assert!(matches!(err, StakeWorkflowError::Transition(_)));
        assert_eq!(workflow.flow().step(), StakeStep::Failed);
        assert!(!sdk.called("fund_node_operator"));
    }

    #[tokio::test]
    async fn banned_validators_fail_at_upload() {
        let sdk = wizard(FundsRequired::default());
        sdk.ban(PUBKEY);
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();

        let err = workflow
            .upload_deposit(&session, deposit())
            .await
            .unwrap_err();
        assert!(matches!(err, StakeWorkflowError::Banned));
        assert_eq!(
            workflow.flow().error(),
            Some("This validator is banned and cannot be staked.")
        );
    }

    #[tokio::test]
    async fn deposits_for_another_validator_are_rejected() {
        let sdk = wizard(FundsRequired::default());
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, "0xbeef").await.unwrap();
        let err = workflow
            .upload_deposit(&session, deposit())
            .await
            .unwrap_err();
        assert!(matches!(err, StakeWorkflowError::DepositMismatch { .. }));
    }

    #[tokio::test]
    async fn revert_reasons_reach_the_failed_step_and_retry_clears_them() {
        let sdk = wizard(FundsRequired::default());
        sdk.fail(
            "stake",
            SdkError::Reverted {
                reason: "bLS key already staked".into(),
            },
        );
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        workflow
            .approve(&session, keystore_material(), "correct horse")
            .await
            .unwrap_err();
        assert_eq!(workflow.flow().step(), StakeStep::Failed);
        assert_eq!(workflow.flow().error(), Some("BLS key already staked"));
        assert!(workflow.flow().keystore().is_none());

        workflow.retry().unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::UploadDeposit);
        assert!(workflow.flow().deposit().is_none());
        assert!(workflow.failure().is_none());
        assert_eq!(workflow.bls_public_key(), Some(PUBKEY));
    }

    #[tokio::test]
    async fn reopening_discards_previous_results() {
        let sdk = wizard(FundsRequired::default());
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();
        workflow
            .approve(&session, keystore_material(), "correct horse")
            .await
            .unwrap();
        assert!(workflow.outcome().is_some());

        workflow.open(&session, PUBKEY).await.unwrap();
        assert_eq!(workflow.flow().step(), StakeStep::UploadDeposit);
        assert!(workflow.outcome().is_none());
        assert!(workflow.link().is_none());
    }

    #[tokio::test]
    async fn short_passwords_fail_before_any_sdk_call() {
        let sdk = wizard(FundsRequired::default());
        let session = session(&sdk);
        let mut workflow = workflow();
        workflow.open(&session, PUBKEY).await.unwrap();
        workflow.upload_deposit(&session, deposit()).await.unwrap();

        workflow
            .approve(&session, keystore_material(), "short")
            .await
            .unwrap_err();
        assert_eq!(
            workflow.flow().error(),
            Some("Your password must be 8 or more characters.")
        );
        assert!(!sdk.called("deposit_data_from_keystore"));
    }
}

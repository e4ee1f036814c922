use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lsd_dapp_interface::{
    BlsPublicKey, DappAction, DappActionOutcome, FundingRequirement, ReadinessState,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sdk::{LsdWizard, SdkError};
use crate::telemetry::DappTelemetry;

/// Result of one readiness check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub bls_public_key: BlsPublicKey,
    pub state: ReadinessState,
    /// `None` when any lookup failed.
    pub funds: Option<FundingRequirement>,
    /// A newer check started before this one finished; the report was not
    /// committed.
    pub superseded: bool,
    pub generation: u64,
}

impl ReadinessReport {
    pub fn ready_to_stake(&self) -> bool {
        self.state.ready_to_stake()
    }

    /// Staking is possible once the validator is not banned and both pools
    /// are funded.
    pub fn can_submit_stake(&self) -> bool {
        self.ready_to_stake()
            && self
                .funds
                .as_ref()
                .map(FundingRequirement::is_satisfied)
                .unwrap_or(false)
    }
}

/// Ban and funding status for a validator, with last-writer-wins
/// protection: only the most recently started check may commit.
#[derive(Debug, Default)]
pub struct ReadinessEvaluator {
    generation: AtomicU64,
    in_flight: AtomicUsize,
    snapshot: Mutex<Option<ReadinessReport>>,
    telemetry: DappTelemetry,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ReadinessEvaluator {
    pub fn new(telemetry: DappTelemetry) -> Self {
        Self {
            telemetry,
            ..Self::default()
        }
    }

    /// True while any check is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Latest committed report.
    pub fn snapshot(&self) -> Option<ReadinessReport> {
        self.lock_snapshot().clone()
    }

    /// Forgets the committed report and invalidates checks still in flight.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.lock_snapshot() = None;
    }

    pub fn can_submit_stake(&self) -> bool {
        self.snapshot()
            .map(|report| report.can_submit_stake())
            .unwrap_or(false)
    }

    /// Loads the ban status and shortfalls for `bls_public_key`. A failed
    /// lookup yields an unknown state rather than an error. The report is
    /// committed only if no newer check started meanwhile.
    pub async fn check(&self, sdk: &dyn LsdWizard, bls_public_key: &str) -> ReadinessReport {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _loading = InFlight::enter(&self.in_flight);

        let (state, funds) = match evaluate(sdk, bls_public_key).await {
            Ok((is_banned, funds)) => {
                self.telemetry
                    .record(DappAction::ReadinessCheck, DappActionOutcome::Success);
                (ReadinessState::from_ban_check(is_banned), Some(funds))
            }
            Err(err) => {
                warn!(bls_public_key, error = %err, "readiness check failed");
                self.telemetry
                    .record(DappAction::ReadinessCheck, DappActionOutcome::Error);
                (ReadinessState::unknown(), None)
            }
        };

        let mut report = ReadinessReport {
            bls_public_key: bls_public_key.to_string(),
            state,
            funds,
            superseded: false,
            generation,
        };

        let mut snapshot = self.lock_snapshot();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(bls_public_key, generation, "discarding superseded readiness check");
            report.superseded = true;
            return report;
        }
        info!(
            bls_public_key,
            ready_to_stake = report.ready_to_stake(),
            funded = report.can_submit_stake(),
            "readiness check complete"
        );
        *snapshot = Some(report.clone());
        report
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, Option<ReadinessReport>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn evaluate(
    sdk: &dyn LsdWizard,
    bls_public_key: &str,
) -> Result<(bool, FundingRequirement), SdkError> {
    let network = sdk.lsdn_for_bls_public_key(bls_public_key).await?;
    let is_banned = sdk.is_bls_public_key_banned(&network, bls_public_key).await?;
    let funds = sdk.funds_required_for_staking(bls_public_key).await?;
    Ok((
        is_banned,
        FundingRequirement::new(funds.sav_eth, funds.fees_and_mev),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use lsd_dapp_interface::Wei;

    use super::*;
    use crate::sdk::{FundsRequired, MockWizard};

    const KEY: &str = "0xaa";

    fn funded_wizard() -> MockWizard {
        MockWizard::new()
            .with_network(KEY, "0xlsm")
            .with_funds(KEY, FundsRequired::default())
    }

    #[tokio::test]
    async fn banned_validators_are_never_ready() {
        let sdk = funded_wizard();
        sdk.ban(KEY);
        let evaluator = ReadinessEvaluator::default();
        let report = evaluator.check(&sdk, KEY).await;
        assert!(!report.ready_to_stake());
        assert!(report.state.is_banned());
        assert!(!evaluator.can_submit_stake());
    }

    #[tokio::test]
    async fn zero_shortfalls_enable_staking() {
        let evaluator = ReadinessEvaluator::default();
        let report = evaluator.check(&funded_wizard(), KEY).await;
        assert!(report.can_submit_stake());
        assert_eq!(evaluator.snapshot(), Some(report));
        assert!(!evaluator.is_loading());
    }

    #[tokio::test]
    async fn outstanding_funding_blocks_staking() {
        let sdk = MockWizard::new().with_network(KEY, "0xlsm").with_funds(
            KEY,
            FundsRequired {
                sav_eth: Wei::from_ether(24),
                fees_and_mev: Wei::from_ether(4),
            },
        );
        let report = ReadinessEvaluator::default().check(&sdk, KEY).await;
        assert!(report.ready_to_stake());
        assert!(!report.can_submit_stake());
        let funds = report.funds.unwrap();
        assert_eq!(funds.sav_eth_ether(), 24.0);
        assert_eq!(funds.fees_and_mev_ether(), 4.0);
    }

    #[tokio::test]
    async fn lookup_failures_clear_readiness_and_funds() {
        let sdk = funded_wizard();
        sdk.fail(
            "funds_required_for_staking",
            SdkError::Provider("rpc down".into()),
        );
        let report = ReadinessEvaluator::default().check(&sdk, KEY).await;
        assert!(!report.ready_to_stake());
        assert_eq!(report.funds, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_results_do_not_overwrite_newer_checks() {
        let slow = funded_wizard();
        slow.ban(KEY);
        slow.push_latency("lsdn_for_bls_public_key", Duration::from_secs(5));
        let fast = funded_wizard();

        let evaluator = Arc::new(ReadinessEvaluator::default());
        let first = {
            let evaluator = Arc::clone(&evaluator);
            let slow = slow.clone();
            tokio::spawn(async move { evaluator.check(&slow, KEY).await })
        };
        tokio::task::yield_now().await;
        assert!(evaluator.is_loading());

        let second = evaluator.check(&fast, KEY).await;
        assert!(!second.superseded);

        let first = first.await.unwrap();
        assert!(first.superseded);
        assert!(evaluator.snapshot().unwrap().ready_to_stake());
        assert!(!evaluator.is_loading());
    }
}

use lsd_dapp_interface::{DappAction, FundingPool, Wei};
use tracing::{info, warn};

use crate::sdk::{LsdWizard, SdkError, TransactionResult};
use crate::session::Session;
use crate::telemetry::DappTelemetry;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FundingError {
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

fn action(pool: FundingPool) -> DappAction {
    match pool {
        FundingPool::SavEth => DappAction::FundSavEth,
        FundingPool::FeesAndMev => DappAction::FundFeesAndMev,
    }
}

/// Draws a validator's shortfall from one of the giant pools.
#[derive(Clone, Debug, Default)]
pub struct FundingDispatcher {
    telemetry: DappTelemetry,
}

impl FundingDispatcher {
    pub fn new(telemetry: DappTelemetry) -> Self {
        Self { telemetry }
    }

    /// Resolves the validator's network, returns idle pool funds to the
    /// giant pool (best effort), then funds `shortfall` and waits for one
    /// confirmation. `Ok(None)` when no SDK is bound to the session.
    pub async fn fund(
        &self,
        session: &Session,
        bls_public_key: &str,
        shortfall: Wei,
        pool: FundingPool,
    ) -> Result<Option<TransactionResult>, FundingError> {
        let Some(sdk) = session.sdk() else {
            return Ok(None);
        };
        let result = self
            .dispatch(sdk.as_ref(), bls_public_key, shortfall, pool)
            .await;
        self.telemetry.observe(action(pool), result).map(Some)
    }

    async fn dispatch(
        &self,
        sdk: &dyn LsdWizard,
        bls_public_key: &str,
        shortfall: Wei,
        pool: FundingPool,
    ) -> Result<TransactionResult, FundingError> {
        let network = sdk.lsdn_for_bls_public_key(bls_public_key).await?;

        match sdk.rotate_funds_back(pool).await {
            Ok(rotation) => {
                if let Err(err) = rotation.wait().await {
                    warn!(pool = pool.title(), error = %err, "rotating funds back was not confirmed");
                }
            }
            Err(err) => {
                warn!(pool = pool.title(), error = %err, "rotating funds back failed");
            }
        }

        info!(
            pool = pool.title(),
            network = %network,
            bls_public_key,
            amount = %shortfall,
            "funding validator from giant pool"
        );
        let transaction = sdk
            .fund_node_operator(pool, &network, bls_public_key, shortfall)
            .await?;
        transaction.wait().await?;
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lsd_dapp_interface::Account;

    use super::*;
    use crate::sdk::MockWizard;
    use crate::session::{ConnectorKind, MockSigner};

    const KEY: &str = "0xaa";

    fn session(sdk: &MockWizard) -> Session {
        Session::new(
            Account::direct("0xabc"),
            ConnectorKind::Injected,
            Arc::new(MockSigner::new(ConnectorKind::Injected, "0xabc")),
            Arc::new(sdk.clone()),
        )
    }

    #[tokio::test]
    async fn funds_the_shortfall_after_rotating_back() {
        let sdk = MockWizard::new().with_network(KEY, "0xlsm");
        let result = FundingDispatcher::default()
            .fund(&session(&sdk), KEY, Wei::from_ether(24), FundingPool::SavEth)
            .await
            .unwrap();
        assert!(result.is_some());

        let methods: Vec<_> = sdk.calls().iter().map(|call| call.method).collect();
        assert_eq!(
            methods,
            vec![
                "lsdn_for_bls_public_key",
                "rotate_funds_back",
                "wait_for_receipt",
                "fund_node_operator",
                "wait_for_receipt",
            ]
        );
        let fund = &sdk.calls_to("fund_node_operator")[0];
        assert_eq!(
            fund.args,
            vec!["sav_eth", "0xlsm", KEY, "24000000000000000000"]
        );
    }

    #[tokio::test]
    async fn rotate_back_failures_are_swallowed() {
        let sdk = MockWizard::new().with_network(KEY, "0xlsm");
        sdk.fail(
            "rotate_funds_back",
            SdkError::Reverted {
                reason: "nothing to rotate".into(),
            },
        );
        let result = FundingDispatcher::default()
            .fund(&session(&sdk), KEY, Wei::from_ether(4), FundingPool::FeesAndMev)
            .await;
        assert!(matches!(result, Ok(Some(_))));
        assert_eq!(sdk.calls_to("fund_node_operator")[0].args[0], "fees_and_mev");
    }

    #[tokio::test]
    async fn funding_failures_propagate() {
        let sdk = MockWizard::new().with_network(KEY, "0xlsm");
        sdk.fail(
            "fund_node_operator",
            SdkError::Reverted {
                reason: "pool exhausted".into(),
            },
        );
        let err = FundingDispatcher::default()
            .fund(&session(&sdk), KEY, Wei::from_ether(4), FundingPool::SavEth)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FundingError::Sdk(SdkError::Reverted {
                reason: "pool exhausted".into()
            })
        );
    }

    #[tokio::test]
    async fn missing_sdk_yields_nothing() {
        let result = FundingDispatcher::default()
            .fund(&Session::disconnected(), KEY, Wei(1), FundingPool::SavEth)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}

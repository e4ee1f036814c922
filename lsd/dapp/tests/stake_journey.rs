use std::sync::Arc;

use lsd_dapp::config::DappConfig;
use lsd_dapp::deposit::fixtures::{entry, CREDENTIALS, PUBKEY};
use lsd_dapp::deposit::DepositObject;
use lsd_dapp::error_map::{describe_stake_workflow, ErrorKind};
use lsd_dapp::sdk::{FundsRequired, MockWizard, SdkError};
use lsd_dapp::services::DappServices;
use lsd_dapp::session::{
    ConnectorEvent, ConnectorKind, MockSdkFactory, MockSigner, SessionResolver, SessionUpdate,
    Signer,
};
use lsd_dapp::subgraph::StaticSubgraph;
use lsd_dapp::tx_link::MockProxyService;
use lsd_dapp::workflows::{StakeStep, StakeWorkflow, StakeWorkflowError};
use lsd_dapp_interface::{FundingPool, Wei};

const FIRST_TX: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

fn services(proxy: MockProxyService) -> DappServices {
    let mut config = DappConfig::default();
    config.staking.withdrawal_credentials = CREDENTIALS.to_string();
    DappServices::new(&config, Arc::new(StaticSubgraph::default()), Arc::new(proxy)).unwrap()
}

fn wizard(funds: FundsRequired) -> MockWizard {
    let sdk = MockWizard::new()
        .with_network(PUBKEY, "0xlsm")
        .with_funds(PUBKEY, funds);
    sdk.set_deposit_data(vec![entry(CREDENTIALS)]);
    sdk
}

async fn connect(sdk: &MockWizard, connector: ConnectorKind, address: &str) -> SessionResolver {
    let mut resolver = SessionResolver::new(
        DappConfig::default().chain,
        Arc::new(MockSdkFactory::new(sdk.clone())),
    );
    let signer: Arc<dyn Signer> = Arc::new(MockSigner::new(connector, address));
    let update = resolver
        .handle(ConnectorEvent::Connected {
            connector,
            address: Some(address.to_string()),
            chain_id: 5,
            signer: Some(signer),
        })
        .await;
    assert!(matches!(update, SessionUpdate::Active { sdk_ready: true, .. }));
    resolver
}

fn keystore() -> serde_json::Value {
    serde_json::json!({ "crypto": {}, "pubkey": PUBKEY })
}

#[tokio::test]
async fn proxy_wallet_stakes_a_funded_validator() {
    let sdk = wizard(FundsRequired::default());
    let resolver = connect(&sdk, ConnectorKind::Safe, "0xsafe").await;
    let session = resolver.session();
    assert!(session.is_proxy_account());

    let proxy = MockProxyService::default().with_hash(FIRST_TX, "0xchainhash");
    let mut workflow = StakeWorkflow::new(&services(proxy.clone()));
    workflow.open(&session, PUBKEY).await.unwrap();
    workflow
        .upload_deposit(&session, DepositObject::from_entries(vec![entry(CREDENTIALS)]).unwrap())
        .await
        .unwrap();
    assert_eq!(workflow.flow().step(), StakeStep::AwaitingKeystore);

    let outcome = workflow
        .approve(&session, keystore(), "correct horse")
        .await
        .unwrap();
    assert_eq!(outcome.hash.as_str(), FIRST_TX);
    assert_eq!(
        outcome.explorer_link.as_deref(),
        Some("https://goerli.etherscan.io/tx/0xchainhash")
    );
    assert_eq!(proxy.lookups(), vec![FIRST_TX.to_string()]);
    assert_eq!(workflow.flow().step(), StakeStep::Success);
}

#[tokio::test]
async fn underfunded_validator_is_funded_from_both_pools_then_staked() {
    let sdk = wizard(FundsRequired {
        sav_eth: Wei::from_ether(24),
        fees_and_mev: Wei::from_ether(4),
    });
    let resolver = connect(&sdk, ConnectorKind::Injected, "0xabc").await;
    let session = resolver.session();
    let mut workflow = StakeWorkflow::new(&services(MockProxyService::default()));

    workflow.open(&session, PUBKEY).await.unwrap();
    workflow
        .upload_deposit(&session, DepositObject::from_entries(vec![entry(CREDENTIALS)]).unwrap())
        .await
        .unwrap();
    assert_eq!(workflow.flow().step(), StakeStep::FundingSavEth);

    workflow.fund(&session, FundingPool::SavEth).await.unwrap();
    sdk.set_funds(PUBKEY, FundsRequired::default());
    workflow.fund(&session, FundingPool::FeesAndMev).await.unwrap();
    assert_eq!(workflow.flow().step(), StakeStep::AwaitingKeystore);

    let outcome = workflow
        .approve(&session, keystore(), "correct horse")
        .await
        .unwrap();
    assert!(outcome
        .explorer_link
        .unwrap()
        .starts_with("https://goerli.etherscan.io/tx/0x"));
    assert_eq!(sdk.calls_to("fund_node_operator").len(), 2);
    assert!(sdk.called("stake"));
}

#[tokio::test]
async fn rejected_stake_can_be_retried() {
    let sdk = wizard(FundsRequired::default());
    let resolver = connect(&sdk, ConnectorKind::Injected, "0xabc").await;
    let session = resolver.session();
    let mut workflow = StakeWorkflow::new(&services(MockProxyService::default()));
    workflow.open(&session, PUBKEY).await.unwrap();
    workflow
        .upload_deposit(&session, DepositObject::from_entries(vec![entry(CREDENTIALS)]).unwrap())
        .await
        .unwrap();

    sdk.fail("stake", SdkError::Reverted {
            reason: "execution reverted: not ready".into(),
        });
    let err = workflow
        .approve(&session, keystore(), "correct horse")
        .await
        .unwrap_err();
    let description = describe_stake_workflow(&err);
    assert_eq!(description.kind, ErrorKind::Transaction);
    assert!(description.is_retryable());
    assert_eq!(workflow.flow().step(), StakeStep::Failed);

    sdk.clear_failure("stake");
    workflow.retry().unwrap();
    assert_eq!(workflow.flow().step(), StakeStep::UploadDeposit);
    assert!(workflow.failure().is_none());
}

#[tokio::test]
async fn banned_validators_cannot_be_staked() {
    let sdk = wizard(FundsRequired::default());
    sdk.ban(PUBKEY);
    let resolver = connect(&sdk, ConnectorKind::Injected, "0xabc").await;
    let session = resolver.session();
    let mut workflow = StakeWorkflow::new(&services(MockProxyService::default()));
    workflow.open(&session, PUBKEY).await.unwrap();

    let err = workflow
        .upload_deposit(&session, DepositObject::from_entries(vec![entry(CREDENTIALS)]).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, StakeWorkflowError::Banned));
    assert!(!sdk.called("stake"));
}

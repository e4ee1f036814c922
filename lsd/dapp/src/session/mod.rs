//! Wallet session and account resolution.
//!
//! [`SessionResolver`] consumes wallet-connector events and keeps the
//! effective [`Account`] plus the SDK instance bound to the connected signer.
//! Workflows never reach for ambient state: they receive a [`Session`]
//! snapshot explicitly.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lsd_dapp_interface::{Account, Address};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ChainConfig;
use crate::sdk::{LsdWizard, SdkError, SigningMethod};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockSdkFactory, MockSigner, SignRequest};

/// Connectors that are connected automatically when they report ready.
pub const AUTO_CONNECT: [ConnectorKind; 1] = [ConnectorKind::Safe];

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no wallet is connected")]
    NotConnected,
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),
    #[error("user rejected the signature request")]
    Rejected,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Wallet connector families supported by the dApp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// Browser-injected provider.
    #[serde(rename = "injected")]
    Injected,
    #[serde(rename = "walletConnect")]
    WalletConnect,
    /// Multisig proxy wallet; transactions go through its relay service.
    #[serde(rename = "safe")]
    Safe,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 3] = [
        ConnectorKind::Injected,
        ConnectorKind::WalletConnect,
        ConnectorKind::Safe,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            ConnectorKind::Injected => "injected",
            ConnectorKind::WalletConnect => "walletConnect",
            ConnectorKind::Safe => "safe",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub const fn is_proxy(self) -> bool {
        matches!(self, ConnectorKind::Safe)
    }

    /// WalletConnect wallets sign the depositor payload as typed data.
    pub const fn signing_method(self) -> SigningMethod {
        match self {
            ConnectorKind::WalletConnect => SigningMethod::TypedData,
            ConnectorKind::Injected | ConnectorKind::Safe => SigningMethod::PersonalSign,
        }
    }
}

/// Signer exposed by the active wallet connector.
#[async_trait]
pub trait Signer: Send + Sync {
    fn connector(&self) -> ConnectorKind;
    async fn address(&self) -> Result<Address, SessionError>;
    async fn sign_message(&self, message: &[u8]) -> Result<String, SessionError>;
    async fn sign_typed_data(&self, typed_data: &Value) -> Result<String, SessionError>;
}

/// Builds an SDK bound to a signer.
pub trait SdkFactory: Send + Sync {
    fn build(&self, signer: Arc<dyn Signer>, chain_id: u64)
        -> Result<Arc<dyn LsdWizard>, SdkError>;
}

/// Events emitted by wallet connectors.
#[derive(Clone)]
pub enum ConnectorEvent {
    Connected {
        connector: ConnectorKind,
        address: Option<Address>,
        chain_id: u64,
        signer: Option<Arc<dyn Signer>>,
    },
    AccountsChanged {
        accounts: Vec<Address>,
    },
    ChainChanged {
        chain_id: u64,
    },
    Disconnected,
}

impl fmt::Debug for ConnectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorEvent::Connected {
                connector,
                address,
                chain_id,
                signer,
            } => f
                .debug_struct("Connected")
                .field("connector", connector)
                .field("address", address)
                .field("chain_id", chain_id)
                .field("has_signer", &signer.is_some())
                .finish(),
            ConnectorEvent::AccountsChanged { accounts } => f
                .debug_struct("AccountsChanged")
                .field("accounts", accounts)
                .finish(),
            ConnectorEvent::ChainChanged { chain_id } => f
                .debug_struct("ChainChanged")
                .field("chain_id", chain_id)
                .finish(),
            ConnectorEvent::Disconnected => f.write_str("Disconnected"),
        }
    }
}

/// Outcome of processing a connector event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    Active {
        account: Option<Account>,
        sdk_ready: bool,
    },
    /// The wallet is on an unsupported chain and should switch to `chain_id`.
    SwitchChain { chain_id: u64 },
    /// The connector must be disconnected so no stale address is used.
    ForceDisconnect,
    Disconnected,
}

/// Snapshot of the connection handed to workflows.
#[derive(Clone, Default)]
pub struct Session {
    pub account: Option<Account>,
    pub connector: Option<ConnectorKind>,
    pub signer: Option<Arc<dyn Signer>>,
    pub sdk: Option<Arc<dyn LsdWizard>>,
}

impl Session {
    pub fn new(
        account: Account,
        connector: ConnectorKind,
        signer: Arc<dyn Signer>,
        sdk: Arc<dyn LsdWizard>,
    ) -> Self {
        Self {
            account: Some(account),
            connector: Some(connector),
            signer: Some(signer),
            sdk: Some(sdk),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn require_account(&self) -> Result<&Account, SessionError> {
        self.account.as_ref().ok_or(SessionError::NotConnected)
    }

    pub fn sdk(&self) -> Option<&Arc<dyn LsdWizard>> {
        self.sdk.as_ref()
    }

    pub fn is_proxy_account(&self) -> bool {
        self.account
            .as_ref()
            .map(|account| account.is_proxy_account)
            .unwrap_or(false)
    }

    pub fn signing_method(&self) -> SigningMethod {
        self.connector
            .map(ConnectorKind::signing_method)
            .unwrap_or(SigningMethod::PersonalSign)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("connector", &self.connector)
            .field("has_signer", &self.signer.is_some())
            .field("sdk_ready", &self.sdk.is_some())
            .finish()
    }
}

#[derive(Default)]
struct ConnectionState {
    connector: Option<ConnectorKind>,
    reported_address: Option<Address>,
    chain_id: Option<u64>,
    signer: Option<Arc<dyn Signer>>,
    account: Option<Account>,
    sdk: Option<Arc<dyn LsdWizard>>,
}

/// Tracks the active connector and derives the acting account and SDK.
pub struct SessionResolver {
    chain: ChainConfig,
    factory: Arc<dyn SdkFactory>,
    state: ConnectionState,
}

impl SessionResolver {
    pub fn new(chain: ChainConfig, factory: Arc<dyn SdkFactory>) -> Self {
        Self {
            chain,
            factory,
            state: ConnectionState::default(),
        }
    }

    pub fn session(&self) -> Session {
        Session {
            account: self.state.account.clone(),
            connector: self.state.connector,
            signer: self.state.signer.clone(),
            sdk: self.state.sdk.clone(),
        }
    }

    pub fn account(&self) -> Option<&Account> {
        self.state.account.as_ref()
    }

    pub async fn handle(&mut self, event: ConnectorEvent) -> SessionUpdate {
        debug!(?event, "connector event");
        match event {
            ConnectorEvent::Connected {
                connector,
                address,
                chain_id,
                signer,
            } => {
                self.state = ConnectionState {
                    connector: Some(connector),
                    reported_address: address,
                    chain_id: Some(chain_id),
                    signer,
                    account: None,
                    sdk: None,
                };
                self.resolve_account().await;
                self.refresh_sdk();
                self.chain_update(chain_id)
            }
            ConnectorEvent::AccountsChanged { accounts } => {
                if self.state.connector == Some(ConnectorKind::Injected) {
                    info!("injected provider changed accounts; forcing disconnect");
                    self.state = ConnectionState::default();
                    return SessionUpdate::ForceDisconnect;
                }
                match accounts.into_iter().next() {
                    Some(address) => {
                        self.state.reported_address = Some(address);
                        self.resolve_account().await;
                        self.active()
                    }
                    None => {
                        self.state = ConnectionState::default();
                        SessionUpdate::Disconnected
                    }
                }
            }
            ConnectorEvent::ChainChanged { chain_id } => {
                self.state.chain_id = Some(chain_id);
                self.refresh_sdk();
                self.chain_update(chain_id)
            }
            ConnectorEvent::Disconnected => {
                self.state = ConnectionState::default();
                SessionUpdate::Disconnected
            }
        }
    }

    async fn resolve_account(&mut self) {
        let Some(connector) = self.state.connector else {
            self.state.account = None;
            return;
        };
        self.state.account = if connector.is_proxy() {
            match &self.state.signer {
                Some(signer) => match signer.address().await {
                    Ok(address) => Some(Account::proxy(address)),
                    Err(err) => {
                        warn!(error = %err, "unable to resolve proxy account from signer");
                        None
                    }
                },
                None => None,
            }
        } else {
            self.state.reported_address.clone().map(Account::direct)
        };
    }

    fn refresh_sdk(&mut self) {
        self.state.sdk = match (&self.state.signer, self.state.chain_id) {
            (Some(signer), Some(chain_id)) if chain_id == self.chain.network_id => {
                match self.factory.build(Arc::clone(signer), chain_id) {
                    Ok(sdk) => Some(sdk),
                    Err(err) => {
                        warn!(error = %err, chain_id, "unable to build SDK");
                        None
                    }
                }
            }
            _ => None,
        };
    }

    fn chain_update(&self, chain_id: u64) -> SessionUpdate {
        if self.chain.is_supported(chain_id) {
            return self.active();
        }
        let target = self
            .chain
            .supported_chain_ids
            .first()
            .copied()
            .unwrap_or(self.chain.network_id);
        info!(chain_id, target, "unsupported chain; requesting switch");
        SessionUpdate::SwitchChain { chain_id: target }
    }

    fn active(&self) -> SessionUpdate {
        SessionUpdate::Active {
            account: self.state.account.clone(),
            sdk_ready: self.state.sdk.is_some(),
        }
    }
}

/// A connector known to the wallet modal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub kind: ConnectorKind,
    pub ready: bool,
}

/// Ready connectors that should be connected without user interaction.
pub fn auto_connect_candidates(
    connectors: &[ConnectorInfo],
    auto_connect: &[ConnectorKind],
) -> Vec<ConnectorKind> {
    connectors
        .iter()
        .filter(|info| info.ready && auto_connect.contains(&info.kind))
        .map(|info| info.kind)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::MockWizard;

    fn resolver(chain: ChainConfig) -> (SessionResolver, MockSdkFactory) {
        let factory = MockSdkFactory::new(MockWizard::new());
        (
            SessionResolver::new(chain, Arc::new(factory.clone())),
            factory,
        )
    }

    fn connected(
        connector: ConnectorKind,
        address: Option<&str>,
        chain_id: u64,
        signer: Option<MockSigner>,
    ) -> ConnectorEvent {
        ConnectorEvent::Connected {
            connector,
            address: address.map(str::to_string),
            chain_id,
            signer: signer.map(|signer| Arc::new(signer) as Arc<dyn Signer>),
        }
    }

    #[tokio::test]
    async fn injected_connector_uses_reported_address() {
        let (mut resolver, factory) = resolver(ChainConfig::default());
        let update = resolver
            .handle(connected(
                ConnectorKind::Injected,
                Some("0xAbc"),
                5,
                Some(MockSigner::new(ConnectorKind::Injected, "0xAbc")),
            ))
            .await;
        assert_eq!(
            update,
            SessionUpdate::Active {
                account: Some(Account::direct("0xAbc")),
                sdk_ready: true,
            }
        );
        assert_eq!(factory.builds(), 1);
        assert!(!resolver.session().is_proxy_account());
    }

    #[tokio::test]
    async fn safe_connector_takes_address_from_signer() {
        let (mut resolver, _) = resolver(ChainConfig::default());
        let update = resolver
            .handle(connected(
                ConnectorKind::Safe,
                Some("0xreported"),
                5,
                Some(MockSigner::new(ConnectorKind::Safe, "0xsafe")),
            ))
            .await;
        assert_eq!(
            update,
            SessionUpdate::Active {
                account: Some(Account::proxy("0xsafe")),
                sdk_ready: true,
            }
        );
        assert!(resolver.session().is_proxy_account());
    }

    #[tokio::test]
    async fn signer_failure_leaves_account_unset() {
        let (mut resolver, _) = resolver(ChainConfig::default());
        let update = resolver
            .handle(connected(
                ConnectorKind::Safe,
                None,
                5,
                Some(MockSigner::failing(ConnectorKind::Safe)),
            ))
            .await;
        assert!(matches!(
            update,
            SessionUpdate::Active { account: None, .. }
        ));
        assert!(resolver.account().is_none());
        assert!(matches!(
            resolver.session().require_account(),
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn injected_account_change_forces_disconnect() {
        let (mut resolver, _) = resolver(ChainConfig::default());
        resolver
            .handle(connected(ConnectorKind::Injected, Some("0xa"), 5, None))
            .await;
        let update = resolver
            .handle(ConnectorEvent::AccountsChanged {
                accounts: vec!["0xb".into()],
            })
            .await;
        assert_eq!(update, SessionUpdate::ForceDisconnect);
        assert!(resolver.account().is_none());
    }

    #[tokio::test]
    async fn wallet_connect_account_change_switches_account() {
        let (mut resolver, _) = resolver(ChainConfig::default());
        resolver
            .handle(connected(ConnectorKind::WalletConnect, Some("0xa"), 5, None))
            .await;
        let update = resolver
            .handle(ConnectorEvent::AccountsChanged {
                accounts: vec!["0xb".into()],
            })
            .await;
        assert_eq!(
            update,
            SessionUpdate::Active {
                account: Some(Account::direct("0xb")),
                sdk_ready: false,
            }
        );
    }

    #[tokio::test]
    async fn sdk_only_exists_on_the_configured_chain() {
        let chain = ChainConfig {
            network_id: 5,
            supported_chain_ids: vec![5, 1],
            ..ChainConfig::default()
        };
        let (mut resolver, factory) = resolver(chain);
        let update = resolver
            .handle(connected(
                ConnectorKind::Injected,
                Some("0xa"),
                1,
                Some(MockSigner::new(ConnectorKind::Injected, "0xa")),
            ))
            .await;
        assert!(matches!(
            update,
            SessionUpdate::Active { sdk_ready: false, .. }
        ));
        assert_eq!(factory.builds(), 0);

        let update = resolver
            .handle(ConnectorEvent::ChainChanged { chain_id: 5 })
            .await;
        assert!(matches!(update, SessionUpdate::Active { sdk_ready: true, .. }));
    }

    #[tokio::test]
    async fn unsupported_chain_requests_switch_to_first_supported() {
        let chain = ChainConfig {
            network_id: 5,
            supported_chain_ids: vec![5, 1],
            ..ChainConfig::default()
        };
        let (mut resolver, _) = resolver(chain);
        let update = resolver
            .handle(connected(
                ConnectorKind::Injected,
                Some("0xa"),
                137,
                Some(MockSigner::new(ConnectorKind::Injected, "0xa")),
            ))
            .await;
        assert_eq!(update, SessionUpdate::SwitchChain { chain_id: 5 });
        assert!(resolver.session().sdk().is_none());
    }

    #[tokio::test]
    async fn disconnect_clears_everything() {
        let (mut resolver, _) = resolver(ChainConfig::default());
        resolver
            .handle(connected(
                ConnectorKind::Injected,
                Some("0xa"),
                5,
                Some(MockSigner::new(ConnectorKind::Injected, "0xa")),
            ))
            .await;
        assert_eq!(
            resolver.handle(ConnectorEvent::Disconnected).await,
            SessionUpdate::Disconnected
        );
        let session = resolver.session();
        assert!(session.account.is_none());
        assert!(session.sdk().is_none());
    }

    #[test]
    fn connector_ids_and_signing_methods() {
        assert_eq!(
            ConnectorKind::from_id("walletConnect"),
            Some(ConnectorKind::WalletConnect)
        );
        assert_eq!(ConnectorKind::from_id("ledger"), None);
        assert_eq!(
            ConnectorKind::WalletConnect.signing_method(),
            SigningMethod::TypedData
        );
        assert_eq!(
            ConnectorKind::Safe.signing_method(),
            SigningMethod::PersonalSign
        );
    }

    #[test]
    fn only_ready_listed_connectors_auto_connect() {
        let connectors = [
            ConnectorInfo {
                kind: ConnectorKind::Injected,
                ready: true,
            },
            ConnectorInfo {
                kind: ConnectorKind::Safe,
                ready: true,
            },
        ];
        assert_eq!(
            auto_connect_candidates(&connectors, &AUTO_CONNECT),
            vec![ConnectorKind::Safe]
        );
        let not_ready = [ConnectorInfo {
            kind: ConnectorKind::Safe,
            ready: false,
        }];
        assert!(auto_connect_candidates(&not_ready, &AUTO_CONNECT).is_empty());
    }
}

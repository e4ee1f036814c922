//! LSD network deployment and parameter updates.

use std::sync::Arc;

use lsd_dapp_interface::{Account, DappAction, NetworkRecord};
use tracing::info;

use super::{connected, settle, Precondition, TransactionOutcome};
use crate::forms::{
    optional_commission, validate_commission, validate_dao_address, validate_ticker, TickerError,
    ValidationError,
};
use crate::sdk::SdkError;
use crate::services::DappServices;
use crate::session::Session;
use crate::subgraph::{SubgraphClientError, SubgraphReader};
use crate::telemetry::DappTelemetry;
use crate::tx_link::TransactionLinkResolver;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error(transparent)]
    Subgraph(#[from] SubgraphClientError),
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error(transparent)]
    Ticker(#[from] TickerError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("LSD network {0} was not found")]
    NetworkNotFound(String),
    #[error("You cannot edit ticker for LSD after the validator has minted derivatives.")]
    TickerLocked,
    #[error("Only the DAO address set during LSD deployment can update parameters.")]
    NotDao,
}

/// Raw form input for a new network.
#[derive(Clone, Copy, Debug)]
pub struct CreateNetworkRequest<'a> {
    pub dao: &'a str,
    pub ticker: &'a str,
    /// Percentage as typed; empty means no commission.
    pub commission: &'a str,
    pub gatekeeping: bool,
}

/// Deploys LSD networks and edits the ones the connected account governs.
#[derive(Clone)]
pub struct NetworkAdmin {
    subgraph: Arc<dyn SubgraphReader>,
    links: TransactionLinkResolver,
    telemetry: DappTelemetry,
}

impl NetworkAdmin {
    pub fn new(services: &DappServices) -> Self {
        Self {
            subgraph: Arc::clone(&services.subgraph),
            links: services.links.clone(),
            telemetry: services.telemetry.clone(),
        }
    }

    /// Networks administered by the connected account.
    pub async fn managed_networks(
        &self,
        session: &Session,
    ) -> Result<Vec<NetworkRecord>, AdminError> {
        let account = session
            .account
            .as_ref()
            .ok_or(Precondition::NotConnected)?;
        Ok(self.subgraph.networks_by_dao(&account.address).await?)
    }

    async fn existing_tickers(&self, except: Option<&str>) -> Result<Vec<String>, AdminError> {
        Ok(self
            .subgraph
            .networks()
            .await?
            .into_iter()
            .filter(|network| {
                except
                    .map(|manager| !network.liquid_staking_manager.eq_ignore_ascii_case(manager))
                    .unwrap_or(true)
            })
            .map(|network| network.ticker)
            .collect())
    }

    async fn require_network(
        &self,
        liquid_staking_manager: &str,
    ) -> Result<NetworkRecord, AdminError> {
        self.subgraph
            .network(liquid_staking_manager)
            .await?
            .ok_or_else(|| AdminError::NetworkNotFound(liquid_staking_manager.to_string()))
    }

    async fn require_dao(
        &self,
        account: &Account,
        liquid_staking_manager: &str,
    ) -> Result<NetworkRecord, AdminError> {
        let network = self.require_network(liquid_staking_manager).await?;
        if !network.is_dao(&account.address) {
            return Err(AdminError::NotDao);
        }
        Ok(network)
    }

    /// Deploys a new network after checking the DAO address, ticker
    /// uniqueness and the optional commission.
    pub async fn create(
        &self,
        session: &Session,
        request: CreateNetworkRequest<'_>,
    ) -> Result<TransactionOutcome, AdminError> {
        let result = self.deploy(session, request).await;
        self.telemetry.observe(DappAction::CreateNetwork, result)
    }

    async fn deploy(
        &self,
        session: &Session,
        request: CreateNetworkRequest<'_>,
    ) -> Result<TransactionOutcome, AdminError> {
        let (account, sdk) = connected(session)?;
        validate_dao_address(request.dao)?;
        validate_ticker(request.ticker, &self.existing_tickers(None).await?)?;
        let commission = optional_commission(request.commission)?;
        let ticker = request.ticker.to_uppercase();

        info!(
            dao = request.dao,
            ticker = %ticker,
            commission,
            gatekeeping = request.gatekeeping,
            "deploying LSD network"
        );
        let transaction = sdk
            .deploy_network(request.dao, &ticker, commission, request.gatekeeping)
            .await?;
        Ok(settle(&self.links, account, transaction).await?)
    }

    /// Renames a network. Locked once any of its validators minted derivatives.
    pub async fn edit_ticker(
        &self,
        session: &Session,
        liquid_staking_manager: &str,
        ticker: &str,
    ) -> Result<TransactionOutcome, AdminError> {
        let result: Result<TransactionOutcome, AdminError> = async {
            let (account, sdk) = connected(session)?;
            let network = self.require_network(liquid_staking_manager).await?;
            if network.minted_derivatives_count >= 1 {
                return Err(AdminError::TickerLocked);
            }
            validate_ticker(ticker, &self.existing_tickers(Some(liquid_staking_manager)).await?)?;
            let transaction = sdk
                .update_ticker(liquid_staking_manager, &ticker.to_uppercase())
                .await?;
            Ok(settle(&self.links, account, transaction).await?)
        }
        .await;
        self.telemetry.observe(DappAction::UpdateNetwork, result)
    }

    /// Sets the DAO commission. Only the network's DAO may call it.
    pub async fn edit_commission(
        &self,
        session: &Session,
        liquid_staking_manager: &str,
        commission: &str,
    ) -> Result<TransactionOutcome, AdminError> {
        let result: Result<TransactionOutcome, AdminError> = async {
            let (account, sdk) = connected(session)?;
            self.require_dao(account, liquid_staking_manager).await?;
            let commission = validate_commission(commission)?;
            let transaction = sdk
                .update_commission(liquid_staking_manager, commission)
                .await?;
            Ok(settle(&self.links, account, transaction).await?)
        }
        .await;
        self.telemetry.observe(DappAction::UpdateNetwork, result)
    }

    /// Turns node runner whitelisting on or off.
    pub async fn edit_gatekeeping(
        &self,
        session: &Session,
        liquid_staking_manager: &str,
        enabled: bool,
    ) -> Result<TransactionOutcome, AdminError> {
        let result: Result<TransactionOutcome, AdminError> = async {
            let (account, sdk) = connected(session)?;
            self.require_dao(account, liquid_staking_manager).await?;
            let transaction = sdk
                .update_whitelisting(liquid_staking_manager, enabled)
                .await?;
            Ok(settle(&self.links, account, transaction).await?)
        }
        .await;
        self.telemetry.observe(DappAction::UpdateNetwork, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DappConfig;
    use crate::sdk::MockWizard;
    use crate::session::{ConnectorKind, MockSigner};
    use crate::subgraph::StaticSubgraph;
    use crate::tx_link::MockProxyService;

    fn network(manager: &str, ticker: &str, minted: u64) -> NetworkRecord {
        NetworkRecord {
            id: manager.into(),
            liquid_staking_manager: manager.into(),
            ticker: ticker.into(),
            commission: 0,
            dao: "0xDAO".into(),
            validators_prepared_count: 0,
            minted_derivatives_count: minted,
            fee_recipient_and_syndicate: None,
        }
    }

    fn admin(proxy: MockProxyService) -> NetworkAdmin {
        let subgraph = StaticSubgraph::default().with_networks(vec![
            network("0xnet1", "WAGYU", 0),
            network("0xnet2", "KOBE", 2),
        ]);
        let services =
            DappServices::new(&DappConfig::default(), Arc::new(subgraph), Arc::new(proxy)).unwrap();
        NetworkAdmin::new(&services)
    }

    fn session(sdk: &MockWizard, account: Account) -> Session {
        Session::new(
            account,
            ConnectorKind::Injected,
            Arc::new(MockSigner::new(ConnectorKind::Injected, "0xdao")),
            Arc::new(sdk.clone()),
        )
    }

    #[tokio::test]
    async fn create_uppercases_and_scales_commission() {
        let sdk = MockWizard::new();
        let outcome = admin(MockProxyService::default())
            .create(
                &session(&sdk, Account::direct("0xdao")),
                CreateNetworkRequest {
                    dao: "0xdao",
                    ticker: "beef",
                    commission: "2.5",
                    gatekeeping: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(
            sdk.calls_to("deploy_network")[0].args,
            vec!["0xdao", "BEEF", "250000", "true"]
        );
        assert_eq!(
            outcome.explorer_link,
            Some(format!("https://goerli.etherscan.io/tx/{}", outcome.hash))
        );
    }

    #[tokio::test]
    async fn create_rejects_duplicate_tickers_and_missing_dao() {
        let sdk = MockWizard::new();
        let admin = admin(MockProxyService::default());
        let session = session(&sdk, Account::direct("0xdao"));
        let request = CreateNetworkRequest {
            dao: "0xdao",
            ticker: "wagyu",
            commission: "",
            gatekeeping: false,
        };
        let err = admin.create(&session, request).await.unwrap_err();
        assert_eq!(err.to_string(), "The ticket name already exists");

        let err = admin
            .create(&session, CreateNetworkRequest { dao: " ", ..request })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "DAO Address required");
        assert!(!sdk.called("deploy_network"));
    }

    #[tokio::test]
    async fn ticker_is_locked_after_minting() {
        let sdk = MockWizard::new();
        let err = admin(MockProxyService::default())
            .edit_ticker(&session(&sdk, Account::direct("0xdao")), "0xnet2", "NEW")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You cannot edit ticker for LSD after the validator has minted derivatives."
        );
    }

    #[tokio::test]
    async fn ticker_may_keep_its_own_name() {
        let sdk = MockWizard::new();
        admin(MockProxyService::default())
            .edit_ticker(&session(&sdk, Account::direct("0xdao")), "0xnet1", "wagyu")
            .await
            .unwrap();
        assert_eq!(
            sdk.calls_to("update_ticker")[0].args,
            vec!["0xnet1", "WAGYU"]
        );
    }

    #[tokio::test]
    async fn only_the_dao_updates_parameters() {
        let sdk = MockWizard::new();
        let admin = admin(MockProxyService::default());
        let err = admin
            .edit_commission(&session(&sdk, Account::direct("0xother")), "0xnet1", "5")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only the DAO address set during LSD deployment can update parameters."
        );

        let err = admin
            .edit_commission(&session(&sdk, Account::direct("0xdao")), "0xnet1", "101")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Commission should be a number from 1 to 100.");

        admin
            .edit_gatekeeping(&session(&sdk, Account::direct("0xDao")), "0xnet1", true)
            .await
            .unwrap();
        assert_eq!(
            sdk.calls_to("update_whitelisting")[0].args,
            vec!["0xnet1", "true"]
        );
    }

    #[tokio::test]
    async fn proxy_transactions_link_to_the_executed_hash() {
        let sdk = MockWizard::new();
        let proxy_hash = format!("0x{:064x}", 1);
        let proxy = MockProxyService::default().with_hash(&proxy_hash, "0xexecuted");
        let outcome = admin(proxy)
            .edit_gatekeeping(&session(&sdk, Account::proxy("0xdao")), "0xnet1", false)
            .await
            .unwrap();
        assert_eq!(
            outcome.explorer_link.as_deref(),
            Some("https://goerli.etherscan.io/tx/0xexecuted")
        );
    }

    #[tokio::test]
    async fn managed_networks_follow_the_dao() {
        let sdk = MockWizard::new();
        let networks = admin(MockProxyService::default())
            .managed_networks(&session(&sdk, Account::direct("0xdao")))
            .await
            .unwrap();
        assert_eq!(networks.len(), 2);
    }
}

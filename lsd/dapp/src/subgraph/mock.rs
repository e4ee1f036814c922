use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use lsd_dapp_interface::{Address, NetworkRecord, ValidatorStatus};

use super::queries;
use super::{
    ActivityEvent, GiantPool, LpToken, NodeRunnerOverview, NodeRunnerRecord, StakehouseAccount,
    SubgraphClientError, SubgraphReader, ValidatorRecord,
};

#[derive(Default)]
struct State {
    sav_eth_pools: Vec<GiantPool>,
    fees_and_mev_pools: Vec<GiantPool>,
    networks: Vec<NetworkRecord>,
    node_runners: HashMap<String, Vec<NodeRunnerRecord>>,
    overviews: HashMap<String, NodeRunnerOverview>,
    waiting: HashMap<(String, String), Vec<ValidatorRecord>>,
    minted: HashMap<(String, String), Vec<ValidatorRecord>>,
    smart_wallets: HashMap<(String, String), Address>,
    stakehouse_accounts: HashMap<String, StakehouseAccount>,
    activity: HashMap<String, Vec<ActivityEvent>>,
    lp_tokens: HashMap<(String, String), Vec<LpToken>>,
    failures: HashMap<&'static str, String>,
    queried: Vec<&'static str>,
}

/// In-memory [`SubgraphReader`] serving fixed data. Keys are lowercased, so
/// lookups are case-insensitive like the real indexer.
#[derive(Clone, Default)]
pub struct StaticSubgraph {
    state: Arc<Mutex<State>>,
}

fn key(value: &str) -> String {
    value.to_lowercase()
}

fn pair(account: &str, network: &str) -> (String, String) {
    (key(account), key(network))
}

impl StaticSubgraph {
    pub fn with_sav_eth_pools(self, pools: Vec<GiantPool>) -> Self {
        self.lock_state().sav_eth_pools = pools;
        self
    }

    pub fn with_fees_and_mev_pools(self, pools: Vec<GiantPool>) -> Self {
        self.lock_state().fees_and_mev_pools = pools;
        self
    }

    pub fn with_networks(self, networks: Vec<NetworkRecord>) -> Self {
        self.set_networks(networks);
        self
    }

    /// Adds a node runner entry for `account`.
    pub fn with_node_runner(self, account: &str, runner: NodeRunnerRecord) -> Self {
        self.lock_state()
            .node_runners
            .entry(key(account))
            .or_default()
            .push(runner);
        self
    }

    pub fn with_overview(self, account: &str, overview: NodeRunnerOverview) -> Self {
        self.lock_state().overviews.insert(key(account), overview);
        self
    }

    pub fn with_waiting_validators(
        self,
        account: &str,
        network: &str,
        validators: Vec<ValidatorRecord>,
    ) -> Self {
        self.lock_state()
            .waiting
            .insert(pair(account, network), validators);
        self
    }

    pub fn with_minted_validators(
        self,
        account: &str,
        network: &str,
        validators: Vec<ValidatorRecord>,
    ) -> Self {
        self.lock_state()
            .minted
            .insert(pair(account, network), validators);
        self
    }

    pub fn with_smart_wallet(self, account: &str, network: &str, wallet: &str) -> Self {
        self.lock_state()
            .smart_wallets
            .insert(pair(account, network), wallet.to_string());
        self
    }

    pub fn with_activity(self, account: &str, events: Vec<ActivityEvent>) -> Self {
        self.lock_state().activity.insert(key(account), events);
        self
    }

    pub fn with_lp_tokens(self, network: &str, token_type: &str, tokens: Vec<LpToken>) -> Self {
        self.lock_state()
            .lp_tokens
            .insert((key(network), token_type.to_string()), tokens);
        self
    }

    pub fn set_networks(&self, networks: Vec<NetworkRecord>) {
        self.lock_state().networks = networks;
    }

    pub fn set_stakehouse_account(&self, account: StakehouseAccount) {
        self.lock_state()
            .stakehouse_accounts
            .insert(key(&account.id), account);
    }

    /// Makes every call of `operation` fail with a GraphQL error.
    pub fn fail(&self, operation: &'static str, message: impl Into<String>) {
        self.lock_state().failures.insert(operation, message.into());
    }

    /// Operation names served so far, in call order.
    pub fn queried(&self) -> Vec<&'static str> {
        self.lock_state().queried.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, SubgraphClientError> {
        let mut state = self.lock_state();
        state.queried.push(operation);
        if let Some(message) = state.failures.get(operation) {
            return Err(SubgraphClientError::Graphql {
                operation: operation.to_string(),
                messages: vec![message.clone()],
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl SubgraphReader for StaticSubgraph {
    async fn giant_sav_eth_pools(&self) -> Result<Vec<GiantPool>, SubgraphClientError> {
        let state = self.enter(queries::GIANT_SAV_ETH_POOLS.name)?;
        Ok(state.sav_eth_pools.clone())
    }

    async fn giant_fees_and_mev_pools(&self) -> Result<Vec<GiantPool>, SubgraphClientError> {
        let state = self.enter(queries::GIANT_FEES_AND_MEV_POOLS.name)?;
        Ok(state.fees_and_mev_pools.clone())
    }

    async fn networks(&self) -> Result<Vec<NetworkRecord>, SubgraphClientError> {
        let state = self.enter(queries::ALL_LSD_NETWORKS.name)?;
        Ok(state.networks.clone())
    }

    async fn network(
        &self,
        liquid_staking_manager: &str,
    ) -> Result<Option<NetworkRecord>, SubgraphClientError> {
        let state = self.enter(queries::LSD_NETWORK.name)?;
        Ok(state
            .networks
            .iter()
            .find(|network| {
                network
                    .liquid_staking_manager
                    .eq_ignore_ascii_case(liquid_staking_manager)
            })
            .cloned())
    }

    async fn networks_by_dao(&self, dao: &str) -> Result<Vec<NetworkRecord>, SubgraphClientError> {
        let state = self.enter(queries::LSD_NETWORKS_BY_DAO.name)?;
        Ok(state
            .networks
            .iter()
            .filter(|network| network.is_dao(dao))
            .cloned()
            .collect())
    }

    async fn node_runners(
        &self,
        account: &str,
    ) -> Result<Vec<NodeRunnerRecord>, SubgraphClientError> {
        let state = self.enter(queries::NODE_RUNNERS.name)?;
        Ok(state
            .node_runners
            .get(&key(account))
            .cloned()
            .unwrap_or_default())
    }

    async fn node_runner_validators_by_status(
        &self,
        account: &str,
        status: &ValidatorStatus,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        let state = self.enter(queries::NODE_RUNNER_VALIDATORS_BY_STATUS.name)?;
        Ok(state
            .node_runners
            .get(&key(account))
            .into_iter()
            .flatten()
            .flat_map(|runner| runner.validators.iter())
            .filter(|validator| &validator.status == status)
            .cloned()
            .collect())
    }

    async fn node_runner_overview(
        &self,
        account: &str,
    ) -> Result<NodeRunnerOverview, SubgraphClientError> {
        let state = self.enter(queries::ALL_NODE_RUNNER_VALIDATORS.name)?;
        Ok(state.overviews.get(&key(account)).cloned().unwrap_or_default())
    }

    async fn waiting_validators(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        let state = self.enter(queries::VALIDATORS_BY_NETWORK.name)?;
        Ok(state
            .waiting
            .get(&pair(account, network))
            .cloned()
            .unwrap_or_default())
    }

    async fn smart_wallet(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Option<Address>, SubgraphClientError> {
        let state = self.enter(queries::SMART_WALLET.name)?;
        Ok(state.smart_wallets.get(&pair(account, network)).cloned())
    }

    async fn minted_validators(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        let state = self.enter(queries::MINTED_VALIDATORS.name)?;
        Ok(state
            .minted
            .get(&pair(account, network))
            .cloned()
            .unwrap_or_default())
    }

    async fn stakehouse_account(
        &self,
        bls_public_key: &str,
    ) -> Result<Option<StakehouseAccount>, SubgraphClientError> {
        let state = self.enter(queries::STAKEHOUSE_ACCOUNTS.name)?;
        Ok(state.stakehouse_accounts.get(&key(bls_public_key)).cloned())
    }

    async fn activity(&self, account: &str) -> Result<Vec<ActivityEvent>, SubgraphClientError> {
        let state = self.enter(queries::ACTIVITY.name)?;
        Ok(state.activity.get(&key(account)).cloned().unwrap_or_default())
    }

    async fn lp_tokens(
        &self,
        network: &str,
        token_type: &str,
    ) -> Result<Vec<LpToken>, SubgraphClientError> {
        let state = self.enter(queries::LP_TOKENS.name)?;
        Ok(state
            .lp_tokens
            .get(&(key(network), token_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

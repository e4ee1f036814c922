use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use lsd_dapp_interface::{Address, NetworkRecord, ValidatorStatus};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::dto::{
    EventsData, GiantFeesAndMevPoolsData, GiantSavEthPoolsData, GraphqlRequest, GraphqlResponse,
    LpTokensData, NetworksData, NodeRunnersData, StakehouseAccountsData,
};
use super::queries::{self, Operation};
use super::{
    ActivityEvent, GiantPool, LpToken, NodeRunnerOverview, NodeRunnerRecord, StakehouseAccount,
    SubgraphReader, ValidatorRecord,
};
use crate::config::SubgraphConfig;

/// GraphQL client splitting operations between the dapp and LSD subgraphs.
#[derive(Clone)]
pub struct SubgraphClient {
    inner: Client,
    dapp_endpoint: Url,
    lsd_endpoint: Url,
    dapp_operations: HashSet<String>,
}

impl SubgraphClient {
    pub fn from_config(config: &SubgraphConfig) -> Result<Self, SubgraphClientError> {
        Self::new(
            &config.dapp_endpoint,
            &config.lsd_endpoint,
            config.dapp_operations.iter().cloned(),
            config.timeout(),
        )
    }

    pub fn new(
        dapp_endpoint: &str,
        lsd_endpoint: &str,
        dapp_operations: impl IntoIterator<Item = String>,
        timeout: Duration,
    ) -> Result<Self, SubgraphClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: client,
            dapp_endpoint: parse_endpoint(dapp_endpoint)?,
            lsd_endpoint: parse_endpoint(lsd_endpoint)?,
            dapp_operations: dapp_operations.into_iter().collect(),
        })
    }

    /// Endpoint an operation is routed to.
    pub fn endpoint_for(&self, operation: &str) -> &Url {
        if self.dapp_operations.contains(operation) {
            &self.dapp_endpoint
        } else {
            &self.lsd_endpoint
        }
    }

    /// Runs an operation and returns the untyped `data` payload.
    pub async fn request(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<Value, SubgraphClientError> {
        let endpoint = self.endpoint_for(operation.name);
        debug!(operation = operation.name, %endpoint, "subgraph query");
        let payload = GraphqlRequest {
            query: operation.query,
            operation_name: operation.name,
            variables,
        };

        let response = self.inner.post(endpoint.clone()).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(SubgraphClientError::HttpStatus(response.status()));
        }

        let response: GraphqlResponse = response.json().await?;
        into_data(operation.name, response)
    }

    /// Runs an operation and deserialises `data` into `R`.
    pub async fn query<R: DeserializeOwned>(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<R, SubgraphClientError> {
        let value = self.request(operation, variables).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn networks_where(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<Vec<NetworkRecord>, SubgraphClientError> {
        let data: NetworksData = self.query(operation, variables).await?;
        data.networks
            .into_iter()
            .map(NetworkRecord::try_from)
            .collect()
    }

    async fn runner_validators(
        &self,
        operation: &Operation,
        variables: Value,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        let data: NodeRunnersData = self.query(operation, variables).await?;
        Ok(data
            .node_runners
            .into_iter()
            .flat_map(|runner| runner.validators)
            .map(ValidatorRecord::from)
            .collect())
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, SubgraphClientError> {
    Url::parse(endpoint).map_err(|err| SubgraphClientError::InvalidEndpoint(err.to_string()))
}

/// GraphQL reports failures in-band; any `errors` entry fails the whole call.
pub(crate) fn into_data(
    operation: &str,
    response: GraphqlResponse,
) -> Result<Value, SubgraphClientError> {
    if !response.errors.is_empty() {
        return Err(SubgraphClientError::Graphql {
            operation: operation.to_string(),
            messages: response.errors.into_iter().map(|error| error.message).collect(),
        });
    }
    match response.data {
        Some(Value::Null) | None => Err(SubgraphClientError::EmptyResponse),
        Some(data) => Ok(data),
    }
}

#[async_trait]
impl SubgraphReader for SubgraphClient {
    async fn giant_sav_eth_pools(&self) -> Result<Vec<GiantPool>, SubgraphClientError> {
        let data: GiantSavEthPoolsData = self.query(&queries::GIANT_SAV_ETH_POOLS, json!({})).await?;
        data.pools.into_iter().map(GiantPool::try_from).collect()
    }

    async fn giant_fees_and_mev_pools(&self) -> Result<Vec<GiantPool>, SubgraphClientError> {
        let data: GiantFeesAndMevPoolsData = self
            .query(&queries::GIANT_FEES_AND_MEV_POOLS, json!({}))
            .await?;
        data.pools.into_iter().map(GiantPool::try_from).collect()
    }

    async fn networks(&self) -> Result<Vec<NetworkRecord>, SubgraphClientError> {
        self.networks_where(&queries::ALL_LSD_NETWORKS, json!({})).await
    }

    async fn network(
        &self,
        liquid_staking_manager: &str,
    ) -> Result<Option<NetworkRecord>, SubgraphClientError> {
        let networks = self
            .networks_where(
                &queries::LSD_NETWORK,
                json!({ "liquidStakingManager": liquid_staking_manager.to_lowercase() }),
            )
            .await?;
        Ok(networks.into_iter().next())
    }

    async fn networks_by_dao(&self, dao: &str) -> Result<Vec<NetworkRecord>, SubgraphClientError> {
        self.networks_where(
            &queries::LSD_NETWORKS_BY_DAO,
            json!({ "dao": dao.to_lowercase() }),
        )
        .await
    }

    async fn node_runners(
        &self,
        account: &str,
    ) -> Result<Vec<NodeRunnerRecord>, SubgraphClientError> {
        let data: NodeRunnersData = self
            .query(
                &queries::NODE_RUNNERS,
                json!({ "account": account.to_lowercase() }),
            )
            .await?;
        Ok(data
            .node_runners
            .into_iter()
            .map(NodeRunnerRecord::from)
            .collect())
    }

    async fn node_runner_validators_by_status(
        &self,
        account: &str,
        status: &ValidatorStatus,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        self.runner_validators(
            &queries::NODE_RUNNER_VALIDATORS_BY_STATUS,
            json!({ "address": account.to_lowercase(), "status": status.as_str() }),
        )
        .await
    }

    async fn node_runner_overview(
        &self,
        account: &str,
    ) -> Result<NodeRunnerOverview, SubgraphClientError> {
        let data: NodeRunnersData = self
            .query(
                &queries::ALL_NODE_RUNNER_VALIDATORS,
                json!({ "address": account.to_lowercase() }),
            )
            .await?;
        Ok(data
            .node_runners
            .into_iter()
            .next()
            .map(|runner| runner.into_overview())
            .unwrap_or_default())
    }

    async fn waiting_validators(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        self.runner_validators(
            &queries::VALIDATORS_BY_NETWORK,
            json!({ "account": account.to_lowercase(), "network": network.to_lowercase() }),
        )
        .await
    }

    async fn smart_wallet(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Option<Address>, SubgraphClientError> {
        let data: NodeRunnersData = self
            .query(
                &queries::SMART_WALLET,
                json!({ "account": account.to_lowercase(), "network": network.to_lowercase() }),
            )
            .await?;
        Ok(data
            .node_runners
            .into_iter()
            .flat_map(|runner| runner.smart_wallets)
            .map(|wallet| wallet.id)
            .next())
    }

    async fn minted_validators(
        &self,
        account: &str,
        network: &str,
    ) -> Result<Vec<ValidatorRecord>, SubgraphClientError> {
        self.runner_validators(
            &queries::MINTED_VALIDATORS,
            json!({ "account": account.to_lowercase(), "network": network.to_lowercase() }),
        )
        .await
    }

    async fn stakehouse_account(
        &self,
        bls_public_key: &str,
    ) -> Result<Option<StakehouseAccount>, SubgraphClientError> {
        let data: StakehouseAccountsData = self
            .query(
                &queries::STAKEHOUSE_ACCOUNTS,
                json!({ "blsPublicKey": bls_public_key }),
            )
            .await?;
        data.accounts
            .into_iter()
            .next()
            .map(StakehouseAccount::try_from)
            .transpose()
    }

    async fn activity(&self, account: &str) -> Result<Vec<ActivityEvent>, SubgraphClientError> {
        let data: EventsData = self
            .query(&queries::ACTIVITY, json!({ "account": account.to_lowercase() }))
            .await?;
        data.events.into_iter().map(ActivityEvent::try_from).collect()
    }

    async fn lp_tokens(
        &self,
        network: &str,
        token_type: &str,
    ) -> Result<Vec<LpToken>, SubgraphClientError> {
        let data: LpTokensData = self
            .query(
                &queries::LP_TOKENS,
                json!({ "liquidStakingManager": network.to_lowercase(), "type": token_type }),
            )
            .await?;
        data.tokens.into_iter().map(LpToken::try_from).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubgraphClientError {
    #[error("invalid subgraph endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("subgraph JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("subgraph transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("subgraph transport error: HTTP status {0}")]
    HttpStatus(StatusCode),
    #[error("subgraph query {operation} failed: {}", messages.join("; "))]
    Graphql {
        operation: String,
        messages: Vec<String>,
    },
    #[error("subgraph returned an empty response")]
    EmptyResponse,
    #[error("subgraph field {field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::dto::GraphqlError;

    fn client() -> SubgraphClient {
        SubgraphClient::new(
            "https://dapp.example/subgraphs/name/dapp",
            "https://lsd.example/subgraphs/name/lsd",
            vec!["Validators".to_string()],
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn configured_operations_go_to_the_dapp_endpoint() {
        let client = client();
        assert_eq!(
            client.endpoint_for(queries::STAKEHOUSE_ACCOUNTS.name).host_str(),
            Some("dapp.example")
        );
        for operation in [queries::ALL_LSD_NETWORKS, queries::GIANT_SAV_ETH_POOLS] {
            assert_eq!(
                client.endpoint_for(operation.name).host_str(),
                Some("lsd.example")
            );
        }
    }

    #[test]
    fn malformed_endpoints_are_rejected() {
        let err = SubgraphClient::new("not a url", "https://lsd.example", Vec::new(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, SubgraphClientError::InvalidEndpoint(_)));
    }

    #[test]
    fn graphql_errors_fail_the_query() {
        let response = GraphqlResponse {
            data: Some(json!({ "nodeRunners": [] })),
            errors: vec![GraphqlError {
                message: "indexing error".into(),
            }],
        };
        let err = into_data("NodeRunners", response).unwrap_err();
        match err {
            SubgraphClientError::Graphql {
                operation,
                messages,
            } => {
                assert_eq!(operation, "NodeRunners");
                assert_eq!(messages, vec!["indexing error".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_data_is_an_empty_response() {
        let response: GraphqlResponse = serde_json::from_value(json!({ "data": null })).unwrap();
        assert!(matches!(
            into_data("Activity", response),
            Err(SubgraphClientError::EmptyResponse)
        ));
    }
}

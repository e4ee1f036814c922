//! Wire shapes of the subgraph responses and their conversion into the
//! validated domain types.

use lsd_dapp_interface::{NetworkRecord, ValidatorStatus, Wei};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::SubgraphClientError;
use super::{
    ActivityEvent, GiantPool, LifecycleStatus, LpToken, NetworkSummary, NodeRunnerOverview,
    NodeRunnerRecord, StakehouseAccount, ValidatorRecord,
};

#[derive(Clone, Debug, Serialize)]
pub struct GraphqlRequest<'a> {
    pub query: &'a str,
    #[serde(rename = "operationName")]
    pub operation_name: &'a str,
    pub variables: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

/// BigInt columns arrive as strings, but some indexers emit plain numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum BigIntField {
    Text(String),
    Number(u64),
}

impl BigIntField {
    fn to_wei(&self, field: &'static str) -> Result<Wei, SubgraphClientError> {
        match self {
            BigIntField::Text(text) => {
                Wei::from_wei_str(text).map_err(|err| invalid(field, err.to_string()))
            }
            BigIntField::Number(number) => Ok(Wei(u128::from(*number))),
        }
    }

    fn to_u64(&self, field: &'static str) -> Result<u64, SubgraphClientError> {
        match self {
            BigIntField::Text(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|err| invalid(field, err.to_string())),
            BigIntField::Number(number) => Ok(*number),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SubgraphClientError {
    SubgraphClientError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGiantPool {
    pub id: String,
    pub available_to_stake: BigIntField,
    #[serde(default, rename = "giantLPToken")]
    pub giant_lp_token: Option<String>,
}

impl TryFrom<RawGiantPool> for GiantPool {
    type Error = SubgraphClientError;

    fn try_from(raw: RawGiantPool) -> Result<Self, Self::Error> {
        Ok(GiantPool {
            available_to_stake: raw.available_to_stake.to_wei("availableToStake")?,
            id: raw.id,
            giant_lp_token: non_empty(raw.giant_lp_token),
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GiantSavEthPoolsData {
    #[serde(rename = "giantSavETHPools", default)]
    pub pools: Vec<RawGiantPool>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GiantFeesAndMevPoolsData {
    #[serde(rename = "giantFeesAndMevPools", default)]
    pub pools: Vec<RawGiantPool>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNetwork {
    pub id: String,
    pub liquid_staking_manager: String,
    #[serde(default)]
    pub ticker: String,
    pub commission: BigIntField,
    #[serde(default)]
    pub dao: String,
    #[serde(default)]
    pub fee_recipient_and_syndicate: Option<String>,
    #[serde(default)]
    pub number_of_knots_that_have_minted_derivatives: Option<BigIntField>,
    #[serde(default)]
    pub number_of_validators_being_prepared: Option<BigIntField>,
}

impl TryFrom<RawNetwork> for NetworkRecord {
    type Error = SubgraphClientError;

    fn try_from(raw: RawNetwork) -> Result<Self, Self::Error> {
        let count = |field: Option<BigIntField>, name: &'static str| {
            field
                .map(|value| value.to_u64(name))
                .transpose()
                .map(Option::unwrap_or_default)
        };
        Ok(NetworkRecord {
            commission: raw.commission.to_u64("commission")?,
            minted_derivatives_count: count(
                raw.number_of_knots_that_have_minted_derivatives,
                "numberOfKnotsThatHaveMintedDerivatives",
            )?,
            validators_prepared_count: count(
                raw.number_of_validators_being_prepared,
                "numberOfValidatorsBeingPrepared",
            )?,
            id: raw.id,
            liquid_staking_manager: raw.liquid_staking_manager,
            ticker: raw.ticker,
            dao: raw.dao,
            fee_recipient_and_syndicate: non_empty(raw.fee_recipient_and_syndicate),
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetworksData {
    #[serde(rename = "liquidStakingNetworks", default)]
    pub networks: Vec<RawNetwork>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValidator {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub liquid_staking_manager: Option<String>,
}

impl From<RawValidator> for ValidatorRecord {
    fn from(raw: RawValidator) -> Self {
        ValidatorRecord {
            status: ValidatorStatus::from(raw.status.as_str()),
            id: raw.id,
            liquid_staking_manager: non_empty(raw.liquid_staking_manager),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNetworkRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub liquid_staking_manager: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawSmartWallet {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNodeRunner {
    pub id: String,
    #[serde(default)]
    pub validators: Vec<RawValidator>,
    #[serde(default)]
    pub liquid_staking_networks: Vec<RawNetworkRef>,
    #[serde(default)]
    pub smart_wallets: Vec<RawSmartWallet>,
}

impl From<RawNodeRunner> for NodeRunnerRecord {
    fn from(raw: RawNodeRunner) -> Self {
        NodeRunnerRecord {
            id: raw.id,
            validators: raw.validators.into_iter().map(ValidatorRecord::from).collect(),
            networks: raw
                .liquid_staking_networks
                .into_iter()
                .filter_map(|network| non_empty(network.liquid_staking_manager))
                .collect(),
        }
    }
}

impl RawNodeRunner {
    pub fn into_overview(self) -> NodeRunnerOverview {
        NodeRunnerOverview {
            validators: self.validators.into_iter().map(ValidatorRecord::from).collect(),
            networks: self
                .liquid_staking_networks
                .into_iter()
                .filter_map(|network| {
                    let id = non_empty(network.id)?;
                    Some(NetworkSummary {
                        id,
                        ticker: network.ticker.unwrap_or_default(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NodeRunnersData {
    #[serde(rename = "nodeRunners", default)]
    pub node_runners: Vec<RawNodeRunner>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStakehouseAccount {
    pub id: String,
    #[serde(default)]
    pub deposit_tx_hash: Option<String>,
    pub lifecycle_status: String,
    #[serde(default, rename = "totalDETHMinted")]
    pub total_deth_minted: Option<BigIntField>,
    #[serde(default)]
    pub mint_from_block_number: Option<BigIntField>,
}

impl TryFrom<RawStakehouseAccount> for StakehouseAccount {
    type Error = SubgraphClientError;

    fn try_from(raw: RawStakehouseAccount) -> Result<Self, Self::Error> {
        let total_deth_minted = raw
            .total_deth_minted
            .map(|value| value.to_wei("totalDETHMinted"))
            .transpose()?;
        // Zero means "not scheduled" in the indexer.
        let mint_from_block_number = raw
            .mint_from_block_number
            .map(|value| value.to_u64("mintFromBlockNumber"))
            .transpose()?
            .filter(|block| *block > 0);
        Ok(StakehouseAccount {
            lifecycle_status: LifecycleStatus::from(raw.lifecycle_status.as_str()),
            id: raw.id,
            deposit_tx_hash: non_empty(raw.deposit_tx_hash),
            total_deth_minted,
            mint_from_block_number,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StakehouseAccountsData {
    #[serde(rename = "stakehouseAccounts", default)]
    pub accounts: Vec<RawStakehouseAccount>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub bls_pub_key_for_knot: Option<String>,
    pub block_number: BigIntField,
}

impl TryFrom<RawEvent> for ActivityEvent {
    type Error = SubgraphClientError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Ok(ActivityEvent {
            block_number: raw.block_number.to_u64("blockNumber")?,
            id: raw.id,
            key: raw.key,
            value: raw.value,
            bls_public_key: non_empty(raw.bls_pub_key_for_knot),
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventsData {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLpToken {
    pub id: String,
    pub token_type: String,
    pub giant_pool_balance: BigIntField,
}

impl TryFrom<RawLpToken> for LpToken {
    type Error = SubgraphClientError;

    fn try_from(raw: RawLpToken) -> Result<Self, Self::Error> {
        Ok(LpToken {
            giant_pool_balance: raw.giant_pool_balance.to_wei("giantPoolBalance")?,
            id: raw.id,
            token_type: raw.token_type,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LpTokensData {
    #[serde(rename = "lptokens", default)]
    pub tokens: Vec<RawLpToken>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pools_parse_wei_strings_and_reject_garbage() {
        let data: GiantSavEthPoolsData = serde_json::from_value(json!({
            "giantSavETHPools": [
                { "id": "0xpool", "availableToStake": "28000000000000000000", "giantLPToken": "0xlp" }
            ]
        }))
        .unwrap();
        let pool = GiantPool::try_from(data.pools[0].clone()).unwrap();
        assert_eq!(pool.available_to_stake, Wei::from_ether(28));
        assert_eq!(pool.giant_lp_token.as_deref(), Some("0xlp"));

        let bad: RawGiantPool = serde_json::from_value(json!({
            "id": "0xpool", "availableToStake": "12.5"
        }))
        .unwrap();
        let err = GiantPool::try_from(bad).unwrap_err();
        assert!(matches!(
            err,
            SubgraphClientError::InvalidField { field: "availableToStake", .. }
        ));
    }

    #[test]
    fn networks_accept_numeric_and_textual_counts() {
        let raw: RawNetwork = serde_json::from_value(json!({
            "id": "0xnet",
            "liquidStakingManager": "0xlsm",
            "ticker": "BLOCK",
            "commission": "20000",
            "dao": "0xDao",
            "feeRecipientAndSyndicate": "",
            "numberOfKnotsThatHaveMintedDerivatives": 2,
        }))
        .unwrap();
        let network = NetworkRecord::try_from(raw).unwrap();
        assert_eq!(network.commission, 20_000);
        assert_eq!(network.minted_derivatives_count, 2);
        assert_eq!(network.validators_prepared_count, 0);
        assert_eq!(network.fee_recipient_and_syndicate, None);
    }

    #[test]
    fn node_runners_keep_network_managers_in_order() {
        let raw: RawNodeRunner = serde_json::from_value(json!({
            "id": "0xrunner",
            "validators": [ { "id": "0xaa", "status": "WAITING_FOR_ETH" } ],
            "liquidStakingNetworks": [
                { "liquidStakingManager": "0xfirst" },
                { "liquidStakingManager": "0xsecond" }
            ]
        }))
        .unwrap();
        let record = NodeRunnerRecord::from(raw);
        assert_eq!(record.networks, vec!["0xfirst", "0xsecond"]);
        assert_eq!(record.validators[0].status, ValidatorStatus::WaitingForEth);
    }

    #[test]
    fn stakehouse_accounts_treat_zero_mint_block_as_unset() {
        let raw: RawStakehouseAccount = serde_json::from_value(json!({
            "id": "0xaa",
            "lifecycleStatus": "DEPOSIT_COMPLETED",
            "mintFromBlockNumber": "0"
        }))
        .unwrap();
        let account = StakehouseAccount::try_from(raw).unwrap();
        assert_eq!(account.lifecycle_status, LifecycleStatus::DepositCompleted);
        assert_eq!(account.mint_from_block_number, None);
    }
}

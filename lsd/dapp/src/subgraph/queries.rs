/// A named GraphQL operation. The name drives endpoint routing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub query: &'static str,
}

pub const GIANT_SAV_ETH_POOLS: Operation = Operation {
    name: "GiantSavETHPools",
    query: r#"query GiantSavETHPools {
  giantSavETHPools {
    id
    availableToStake
    giantLPToken
  }
}"#,
};

pub const GIANT_FEES_AND_MEV_POOLS: Operation = Operation {
    name: "GiantFeesAndMevPools",
    query: r#"query GiantFeesAndMevPools {
  giantFeesAndMevPools {
    id
    availableToStake
    giantLPToken
  }
}"#,
};

pub const ALL_LSD_NETWORKS: Operation = Operation {
    name: "AllLSDNetworks",
    query: r#"query AllLSDNetworks {
  liquidStakingNetworks(orderBy: ticker) {
    id
    ticker
    commission
    dao
    liquidStakingManager
    feeRecipientAndSyndicate
    numberOfKnotsThatHaveMintedDerivatives
    numberOfValidatorsBeingPrepared
  }
}"#,
};

pub const LSD_NETWORK: Operation = Operation {
    name: "LSDNetworks",
    query: r#"query LSDNetworks($liquidStakingManager: Bytes!) {
  liquidStakingNetworks(where: { liquidStakingManager: $liquidStakingManager }) {
    id
    ticker
    commission
    dao
    liquidStakingManager
    feeRecipientAndSyndicate
    numberOfKnotsThatHaveMintedDerivatives
    numberOfValidatorsBeingPrepared
  }
}"#,
};

pub const LSD_NETWORKS_BY_DAO: Operation = Operation {
    name: "LSDNetworksByDao",
    query: r#"query LSDNetworksByDao($dao: Bytes!) {
  liquidStakingNetworks(where: { dao: $dao }) {
    id
    ticker
    commission
    dao
    liquidStakingManager
    feeRecipientAndSyndicate
    numberOfKnotsThatHaveMintedDerivatives
    numberOfValidatorsBeingPrepared
  }
}"#,
};

pub const NODE_RUNNERS: Operation = Operation {
    name: "NodeRunners",
    query: r#"query NodeRunners($account: String!) {
  nodeRunners(where: { id: $account }) {
    id
    validators(where: { withdrawn: false }) {
      id
      status
    }
    liquidStakingNetworks {
      liquidStakingManager
    }
  }
}"#,
};

pub const VALIDATORS_BY_NETWORK: Operation = Operation {
    name: "ValidatorsByNetwork",
    query: r#"query ValidatorsByNetwork($account: String!, $network: Bytes!) {
  nodeRunners(
    where: {
      id: $account
      liquidStakingNetworks_: { liquidStakingManager: $network }
      validators_: { status_in: ["WAITING_FOR_ETH"] }
    }
  ) {
    id
    validators(where: { status_in: ["WAITING_FOR_ETH"], liquidStakingManager: $network }) {
      id
      status
    }
  }
}"#,
};

pub const SMART_WALLET: Operation = Operation {
    name: "SmartWallet",
    query: r#"query SmartWallet($account: String!, $network: Bytes!) {
  nodeRunners(where: { id: $account, liquidStakingNetworks_: { liquidStakingManager: $network } }) {
    id
    smartWallets(where: { liquidStakingNetwork_: { liquidStakingManager: $network } }) {
      id
    }
  }
}"#,
};

pub const MINTED_VALIDATORS: Operation = Operation {
    name: "MintedValidators",
    query: r#"query MintedValidators($account: String!, $network: Bytes!) {
  nodeRunners(
    where: {
      id: $account
      liquidStakingNetworks_: { liquidStakingManager: $network }
      validators_: { status: "MINTED_DERIVATIVES" }
    }
  ) {
    id
    validators(where: { status: "MINTED_DERIVATIVES", liquidStakingManager: $network }) {
      id
      status
    }
  }
}"#,
};

pub const NODE_RUNNER_VALIDATORS_BY_STATUS: Operation = Operation {
    name: "getNodeRunnersQuery",
    query: r#"query getNodeRunnersQuery($address: String!, $status: String!) {
  nodeRunners(where: { id: $address }) {
    id
    validators(where: { status: $status }) {
      id
      status
    }
  }
}"#,
};

pub const ALL_NODE_RUNNER_VALIDATORS: Operation = Operation {
    name: "getAllNodeRunnersQuery",
    query: r#"query getAllNodeRunnersQuery($address: String!) {
  nodeRunners(where: { id: $address }) {
    id
    validators {
      id
      status
      liquidStakingManager
    }
    liquidStakingNetworks {
      id
      ticker
    }
  }
}"#,
};

pub const STAKEHOUSE_ACCOUNTS: Operation = Operation {
    name: "Validators",
    query: r#"query Validators($blsPublicKey: String!) {
  stakehouseAccounts(
    where: { id: $blsPublicKey }
    orderBy: registerValidatorBlockNumber
    orderDirection: asc
  ) {
    id
    depositTxHash
    lifecycleStatus
    totalDETHMinted
    mintFromBlockNumber
  }
}"#,
};

pub const ACTIVITY: Operation = Operation {
    name: "Activity",
    query: r#"query Activity($account: String!) {
  events(
    where: {
      key_in: [
        "ETH_DEPOSITED_BY_STAKER"
        "LP_BURNED_FOR_ETH"
        "GIANT_LP_SWAPPED"
        "SMART_WALLET_CREATED"
        "NEW_VALIDATOR_REGISTERED"
        "LP_TOKEN_ISSUED"
        "LP_TOKEN_MINTED"
        "KNOT_STAKED"
        "STAKEHOUSE_CREATED"
        "STAKEHOUSE_JOINED"
        "DETH_CLAIMED"
        "FEES_AND_MEV_CLAIMED"
        "NODE_RUNNER_REWARDS_CLAIMED"
      ]
      from: $account
    }
    orderBy: blockNumber
    orderDirection: desc
  ) {
    id
    key
    value
    blsPubKeyForKnot
    blockNumber
  }
}"#,
};

pub const LP_TOKENS: Operation = Operation {
    name: "lptokens",
    query: r#"query lptokens($liquidStakingManager: Bytes!, $type: String!) {
  lptokens(
    where: {
      tokenType: $type
      giantPoolBalance_gt: 0
      liquidStakingNetwork_: { id: $liquidStakingManager }
    }
  ) {
    id
    tokenType
    giantPoolBalance
  }
}"#,
};

pub const ALL_OPERATIONS: [Operation; 14] = [
    GIANT_SAV_ETH_POOLS,
    GIANT_FEES_AND_MEV_POOLS,
    ALL_LSD_NETWORKS,
    LSD_NETWORK,
    LSD_NETWORKS_BY_DAO,
    NODE_RUNNERS,
    VALIDATORS_BY_NETWORK,
    SMART_WALLET,
    MINTED_VALIDATORS,
    NODE_RUNNER_VALIDATORS_BY_STATUS,
    ALL_NODE_RUNNER_VALIDATORS,
    STAKEHOUSE_ACCOUNTS,
    ACTIVITY,
    LP_TOKENS,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_match_query_documents() {
        for operation in ALL_OPERATIONS {
            let header = format!("query {}", operation.name);
            assert!(
                operation.query.starts_with(&header),
                "{} does not declare its operation name",
                operation.name
            );
        }
    }

    #[test]
    fn operation_names_are_unique() {
        let mut names: Vec<_> = ALL_OPERATIONS.iter().map(|op| op.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_OPERATIONS.len());
    }
}

//! Read-only operator commands against the configured subgraph.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use lsd_dapp_interface::{abbreviate, format_ether, NetworkRecord};

use crate::config::{ConfigError, DappConfig};
use crate::deposit::{DepositError, DepositObject};
use crate::forms::validate_ticker;
use crate::subgraph::{SubgraphClient, SubgraphClientError, SubgraphReader};
use crate::validators::{
    already_has_staked, filter_by_ticker, network_ticker, validator_action, PoolLiquidity,
    ValidatorAction,
};

const DEFAULT_CONFIG_PATH: &str = "config/dapp.toml";

#[derive(Debug, thiserror::Error)]
pub enum DappCliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Subgraph(#[from] SubgraphClientError),
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Where the commands read their configuration from.
#[derive(Clone, Debug, Default)]
pub struct CliContext {
    pub config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn resolve_config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load_config(&self) -> Result<DappConfig, DappCliError> {
        Ok(DappConfig::load_or_default(Some(&self.resolve_config_path()))?)
    }
}

#[derive(Debug, Subcommand)]
pub enum DappCommand {
    /// List every LSD network.
    Networks,
    /// List the validators registered by a node runner.
    Validators(ValidatorsCommand),
    /// Show ETH available in the giant pools.
    Pools,
    /// Check whether a ticker can be used for a new network.
    CheckTicker(CheckTickerCommand),
    /// Validate a deposit_data.json file against the configured credentials.
    CheckDeposit(CheckDepositCommand),
    /// Manage the configuration file.
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct ValidatorsCommand {
    /// Node runner account address.
    pub account: String,
    /// Only list validators whose network ticker contains this text.
    #[arg(long)]
    pub ticker: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckTickerCommand {
    pub ticker: String,
}

#[derive(Debug, Args)]
pub struct CheckDepositCommand {
    /// Path to the deposit_data.json file.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Write the default configuration to `path`.
    Init {
        path: PathBuf,
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl DappCommand {
    pub async fn execute(&self, context: &CliContext) -> Result<(), DappCliError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let DappCommand::Config(ConfigCommand { command }) = self {
            return init_config(command, &mut out);
        }
        let config = context.load_config()?;
        let client = SubgraphClient::from_config(&config.subgraph)?;
        self.run(&config, &client, &mut out).await
    }

    /// Runs the command against `reader`, writing the report to `out`.
    pub async fn run(
        &self,
        config: &DappConfig,
        reader: &dyn SubgraphReader,
        out: &mut dyn Write,
    ) -> Result<(), DappCliError> {
        match self {
            DappCommand::Networks => {
                let networks = reader.networks().await?;
                write_networks(out, &networks)?;
            }
            DappCommand::Validators(cmd) => cmd.run(reader, out).await?,
            DappCommand::Pools => {
                let liquidity = PoolLiquidity::load(reader).await?;
                writeln!(out, "Giant pools\n")?;
                writeln!(
                    out,
                    "  savETH        : {} ETH",
                    format_ether(liquidity.staking.total())
                )?;
                writeln!(
                    out,
                    "  Fees and MEV  : {} ETH",
                    format_ether(liquidity.fees_and_mev.total())
                )?;
                writeln!(
                    out,
                    "  Combined      : {} ETH",
                    format_ether(liquidity.main.total())
                )?;
            }
            DappCommand::CheckTicker(cmd) => {
                let tickers: Vec<String> = reader
                    .networks()
                    .await?
                    .into_iter()
                    .map(|network| network.ticker)
                    .collect();
                validate_ticker(&cmd.ticker, &tickers)
                    .map_err(|err| DappCliError::Rejected(err.to_string()))?;
                writeln!(out, "Ticker {} is available", cmd.ticker.to_uppercase())?;
            }
            DappCommand::CheckDeposit(cmd) => check_deposit(config, &cmd.file, out)?,
            DappCommand::Config(ConfigCommand { command }) => init_config(command, out)?,
        }
        Ok(())
    }
}

impl ValidatorsCommand {
    async fn run(
        &self,
        reader: &dyn SubgraphReader,
        out: &mut dyn Write,
    ) -> Result<(), DappCliError> {
        let overview = reader.node_runner_overview(&self.account).await?;
        let networks = reader.networks().await?;
        let liquidity = PoolLiquidity::load(reader).await?;
        let blocked = already_has_staked(&overview.validators, &liquidity);
        let listed = filter_by_ticker(
            &overview.validators,
            &networks,
            self.ticker.as_deref().unwrap_or_default(),
        );

        writeln!(out, "Validators of {}\n", self.account)?;
        if listed.is_empty() {
            writeln!(out, "  none")?;
            return Ok(());
        }
        for (index, validator) in listed.into_iter().enumerate() {
            let action = validator_action(&validator.status, false, blocked, false);
            writeln!(
                out,
                "  {index:<3} {:<24} {:<8} {}",
                abbreviate(&validator.id, 9, 9),
                network_ticker(validator, &networks).unwrap_or("-"),
                describe_action(&action),
            )?;
        }
        Ok(())
    }
}

fn describe_action(action: &ValidatorAction) -> String {
    match action {
        ValidatorAction::MintAvailable => "Minting Available".into(),
        ValidatorAction::Stake { enabled: true } => "Ready to stake".into(),
        ValidatorAction::Stake { enabled: false } => "Ready to stake (disabled)".into(),
        ValidatorAction::WaitingForEth => "Waiting for ETH".into(),
        ValidatorAction::Label(label) => label.clone(),
        ValidatorAction::Hidden => "-".into(),
    }
}

fn write_networks(out: &mut dyn Write, networks: &[NetworkRecord]) -> io::Result<()> {
    writeln!(out, "LSD networks\n")?;
    if networks.is_empty() {
        return writeln!(out, "  none");
    }
    for network in networks {
        writeln!(
            out,
            "  {:<6} {:<14} commission {:>7.3}%  minted {:>3}  dao {}",
            network.ticker,
            abbreviate(&network.liquid_staking_manager, 6, 4),
            network.commission_percent(),
            network.minted_derivatives_count,
            abbreviate(&network.dao, 6, 4),
        )?;
    }
    Ok(())
}

fn check_deposit(
    config: &DappConfig,
    file: &Path,
    out: &mut dyn Write,
) -> Result<(), DappCliError> {
    let contents = fs::read_to_string(file)
        .with_context(|| format!("unable to read deposit file {}", file.display()))?;
    let deposit = DepositObject::from_json(&contents).map_err(reject)?;
    deposit
        .validate_credentials(&config.staking.withdrawal_credentials)
        .map_err(reject)?;
    writeln!(out, "Deposit file is valid\n")?;
    writeln!(out, "  Validators : {}", deposit.entries().len())?;
    writeln!(out, "  Public key : {}", deposit.primary().pubkey)?;
    Ok(())
}

fn reject(err: DepositError) -> DappCliError {
    DappCliError::Rejected(err.to_string())
}

fn init_config(command: &ConfigSubcommand, out: &mut dyn Write) -> Result<(), DappCliError> {
    match command {
        ConfigSubcommand::Init { path, force } => {
            if path.exists() && !force {
                return Err(DappCliError::Rejected(format!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                )));
            }
            DappConfig::default().save(path)?;
            writeln!(out, "Configuration written to {}", path.display())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use lsd_dapp_interface::{ValidatorStatus, Wei};

    use super::*;
    use crate::deposit::fixtures::{entry, CREDENTIALS};
    use crate::subgraph::{
        GiantPool, NetworkSummary, NodeRunnerOverview, StaticSubgraph, ValidatorRecord,
    };

    fn network(manager: &str, ticker: &str) -> NetworkRecord {
        NetworkRecord {
            id: manager.into(),
            liquid_staking_manager: manager.into(),
            ticker: ticker.into(),
            commission: 250_000,
            dao: "0xdao".into(),
            validators_prepared_count: 0,
            minted_derivatives_count: 1,
            fee_recipient_and_syndicate: None,
        }
    }

    fn pool(ether: u64) -> GiantPool {
        GiantPool {
            id: "0xpool".into(),
            available_to_stake: Wei::from_ether(ether),
            giant_lp_token: None,
        }
    }

    async fn run(
        command: DappCommand,
        reader: &StaticSubgraph,
        config: &DappConfig,
    ) -> (Result<(), DappCliError>, String) {
        let mut out = Vec::new();
        let result = command.run(config, reader, &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn networks_print_ticker_and_commission() {
        let reader = StaticSubgraph::default().with_networks(vec![network("0xnet1", "WAGYU")]);
        let (result, output) = run(DappCommand::Networks, &reader, &DappConfig::default()).await;
        result.unwrap();
        assert!(output.contains("WAGYU"));
        assert!(output.contains("2.500%"));
    }

    #[tokio::test]
    async fn taken_tickers_are_rejected() {
        let reader = StaticSubgraph::default().with_networks(vec![network("0xnet1", "WAGYU")]);
        let (result, _) = run(
            DappCommand::CheckTicker(CheckTickerCommand { ticker: "wagyu".into() }),
            &reader,
            &DappConfig::default(),
        )
        .await;
        assert_eq!(result.unwrap_err().to_string(), "The ticket name already exists");

        let (result, output) = run(
            DappCommand::CheckTicker(CheckTickerCommand { ticker: "kobe".into() }),
            &reader,
            &DappConfig::default(),
        )
        .await;
        result.unwrap();
        assert_eq!(output.trim(), "Ticker KOBE is available");
    }

    #[tokio::test]
    async fn validators_are_filtered_by_ticker() {
        let validator = |id: &str, network: &str| ValidatorRecord {
            id: id.into(),
            status: ValidatorStatus::ReadyToStake,
            liquid_staking_manager: Some(network.into()),
        };
        let reader = StaticSubgraph::default()
            .with_networks(vec![network("0xnet1", "WAGYU"), network("0xnet2", "KOBE")])
            .with_sav_eth_pools(vec![pool(24)])
            .with_fees_and_mev_pools(vec![pool(4)])
            .with_overview(
                "0xabc",
                NodeRunnerOverview {
                    validators: vec![
                        validator("0xaaaaaaaaaaaaaaaaaaaaaaaa", "0xnet1"),
                        validator("0xbbbbbbbbbbbbbbbbbbbbbbbb", "0xnet2"),
                    ],
                    networks: vec![NetworkSummary {
                        id: "0xnet1".into(),
                        ticker: "WAGYU".into(),
                    }],
                },
            );
        let (result, output) = run(
            DappCommand::Validators(ValidatorsCommand {
                account: "0xabc".into(),
                ticker: Some("kob".into()),
            }),
            &reader,
            &DappConfig::default(),
        )
        .await;
        result.unwrap();
        assert!(output.contains("KOBE"));
        assert!(!output.contains("WAGYU"));
        assert!(output.contains("Ready to stake"));
        assert!(!output.contains("disabled"));
    }

    #[tokio::test]
    async fn pools_report_both_giant_pools() {
        let reader = StaticSubgraph::default()
            .with_sav_eth_pools(vec![pool(24)])
            .with_fees_and_mev_pools(vec![pool(4)]);
        let (result, output) = run(DappCommand::Pools, &reader, &DappConfig::default()).await;
        result.unwrap();
        assert!(output.contains("28.0 ETH"));
    }

    #[tokio::test]
    async fn deposit_files_are_checked_against_the_configured_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("deposit_data.json");
        fs::write(&file, serde_json::to_string(&vec![entry(CREDENTIALS)]).unwrap()).unwrap();

        let mut config = DappConfig::default();
        config.staking.withdrawal_credentials = CREDENTIALS.into();
        let reader = StaticSubgraph::default();
        let command = || DappCommand::CheckDeposit(CheckDepositCommand { file: file.clone() });
        let (result, output) = run(command(), &reader, &config).await;
        result.unwrap();
        assert!(output.contains("Validators : 1"));

        config.staking.withdrawal_credentials =
            "010000000000000000000000ffffffffffffffffffffffffffffffffffffffff".into();
        let (result, _) = run(command(), &reader, &config).await;
        assert_eq!(result.unwrap_err().to_string(), "Incorrect withdrawal credentials");
    }

    #[tokio::test]
    async fn config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dapp.toml");
        let command = |force| {
            DappCommand::Config(ConfigCommand {
                command: ConfigSubcommand::Init {
                    path: path.clone(),
                    force,
                },
            })
        };
        let reader = StaticSubgraph::default();
        let (result, _) = run(command(false), &reader, &DappConfig::default()).await;
        result.unwrap();
        assert_eq!(DappConfig::load(&path).unwrap().chain.network_id, 5);

        let (result, _) = run(command(false), &reader, &DappConfig::default()).await;
        assert!(matches!(result, Err(DappCliError::Rejected(_))));
        let (result, _) = run(command(true), &reader, &DappConfig::default()).await;
        result.unwrap();
    }
}

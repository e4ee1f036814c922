use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lsd_dapp::cli::{CliContext, DappCliError, DappCommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Inspect LSD networks, validators and giant pools", long_about = None)]
struct DappCli {
    /// Configuration file; defaults are used when it does not exist.
    #[arg(long, env = "LSD_DAPP_CONFIG")]
    config: Option<PathBuf>,
    /// Log filter, e.g. `lsd_dapp=debug`.
    #[arg(long, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: DappCommand,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DappCli::parse();
    init_tracing(&cli.log);
    let context = CliContext::new(cli.config);
    debug!(config = %context.resolve_config_path().display(), "running command");
    match cli.command.execute(&context).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_cli_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn report_cli_error(error: &DappCliError) {
    match error {
        DappCliError::Rejected(reason) => eprintln!("{reason}"),
        DappCliError::Config(err) => eprintln!("configuration error: {err}"),
        DappCliError::Subgraph(err) => eprintln!("subgraph request failed: {err}"),
        DappCliError::Io(err) => eprintln!("io error: {err}"),
        DappCliError::Other(err) => eprintln!("{err:#}"),
    }
}

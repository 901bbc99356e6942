//! pvkeys - bind single keystrokes to EPICS process variable writes.

mod logging;
mod session;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use pvkeys_core::{
    Config, Overrides, ProviderKind, ToolClient, ToolKind, default_config_path, sim_client,
};
use session::RunMode;
use std::path::PathBuf;
use std::process::ExitCode;

/// Bind single keystrokes to process variable writes.
#[derive(Parser, Debug)]
#[command(name = "pvkeys", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/pvkeys/pvkeys.toml)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// PV name prefix, replacing the one in the file
    #[arg(short, long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Provider to use: ca, pva or sim
    #[arg(long, value_name = "NAME")]
    provider: Option<ProviderKind>,

    /// Resolve all bindings, print them and exit
    #[arg(long)]
    check: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path().context("No config file given and no config directory")?,
    };
    let mut config =
        Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;
    config.apply(&Overrides {
        prefix: cli.prefix.clone(),
        provider: cli.provider,
    });

    let mode = if cli.check {
        RunMode::Check
    } else {
        RunMode::Interactive
    };

    match config.provider {
        ProviderKind::Ca => {
            let client = ToolClient::new(ToolKind::ChannelAccess, config.timeout);
            session::run(&client, &config, mode)
        }
        ProviderKind::Pva => {
            let client = ToolClient::new(ToolKind::PvAccess, config.timeout);
            session::run(&client, &config, mode)
        }
        ProviderKind::Sim => {
            let client = sim_client(&config.sim)?;
            session::run(&client, &config, mode)
        }
    }
}

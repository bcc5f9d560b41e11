//! ---
//! halow_section: "08-operator-cli"
//! halow_subsection: "binary"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Operator CLI for OTA rollouts and device configuration."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{Parser, Subcommand};

mod context;
mod device;
mod ota;

use context::{Context, GlobalOptions};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "HaLow fleet OTA and device configuration utility",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(subcommand, about = "Firmware rollout actions")]
    Ota(ota::OtaCommand),
    #[command(subcommand, about = "Device configuration actions")]
    Config(device::ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = Context::load(&cli.global)?;
    if let Err(err) = halow_common::init_tracing("halowctl", &context.config.logging) {
        halow_logging::init();
        tracing::warn!(error = %err, "file logging unavailable; logging to stderr only");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = match cli.command {
        Commands::Ota(cmd) => runtime.block_on(ota::run(cmd, &context)),
        Commands::Config(cmd) => runtime.block_on(device::run(cmd, &context)),
    };
    context.write_metrics()?;
    outcome
}

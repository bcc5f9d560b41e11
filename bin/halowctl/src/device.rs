//! ---
//! halow_section: "08-operator-cli"
//! halow_subsection: "binary"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Device configuration subcommands."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use anyhow::{bail, Result};
use clap::Subcommand;
use halow_core::{CommandSettings, ConfigCommandHandler};

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Publish a new sleep/report interval to the fleet.
    Sleep {
        /// Interval in seconds.
        #[arg(value_name = "SECONDS", allow_hyphen_values = true)]
        seconds: i64,
    },
    /// Print the effective configuration as TOML.
    Show,
}

pub async fn run(command: ConfigCommand, context: &Context) -> Result<()> {
    match command {
        ConfigCommand::Sleep { seconds } => send_sleep(context, seconds).await,
        ConfigCommand::Show => show(context),
    }
}

async fn send_sleep(context: &Context, seconds: i64) -> Result<()> {
    let channel = context.open_channel()?;
    let handler = ConfigCommandHandler::new(
        channel.publisher(),
        CommandSettings::from_config(&context.config),
    );
    let event = handler.send_sleep_interval(seconds).await;
    channel.close().await;

    if event.is_error() {
        bail!("{}", event.message());
    }
    println!("{event}");
    Ok(())
}

fn show(context: &Context) -> Result<()> {
    match &context.source {
        Some(path) => println!("# source: {}", path.display()),
        None => println!("# source: built-in defaults"),
    }
    print!("{}", context.config.to_toml()?);
    Ok(())
}

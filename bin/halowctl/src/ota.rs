//! ---
//! halow_section: "08-operator-cli"
//! halow_subsection: "binary"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "OTA rollout subcommands."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use clap::Subcommand;
use halow_core::{
    FirmwareUploader, OtaMetrics, OtaOrchestrator, OtaSettings, OtaStatus, UploadSettings,
};
use halow_supervisor::{Pm2Supervisor, ProcessSupervisor};
use tokio::sync::mpsc;
use tracing::info;

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub enum OtaCommand {
    /// Start the update process, wait for completion, then start the ingestion bridge.
    Start,
    /// Stream a firmware image to the fleet and print the completion marker.
    Upload {
        /// Firmware image to upload.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn run(command: OtaCommand, context: &Context) -> Result<()> {
    match command {
        OtaCommand::Start => start(context).await,
        OtaCommand::Upload { file } => upload(context, &file).await,
    }
}

async fn start(context: &Context) -> Result<()> {
    let settings = OtaSettings::from(&context.config.ota);
    let supervisor: Arc<dyn ProcessSupervisor> = if context.dry_run {
        Arc::new(DryRunSupervisor {
            marker: settings.completion_marker.clone(),
        })
    } else {
        Arc::new(Pm2Supervisor::from_config(&context.config.supervisor))
    };
    let metrics = OtaMetrics::register(&context.registry).context("registering OTA metrics")?;
    let orchestrator = OtaOrchestrator::new(settings, supervisor).with_metrics(metrics);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = orchestrator.start_ota(tx)?;
    info!(session = %handle.session_id(), "OTA session started");
    while let Some(event) = rx.recv().await {
        println!("{event}");
    }

    let report = handle.wait().await?;
    match report.status {
        OtaStatus::Completed => Ok(()),
        status => bail!(
            "OTA session {} {} after {} attempts",
            report.session_id,
            status,
            report.attempts
        ),
    }
}

async fn upload(context: &Context, file: &Path) -> Result<()> {
    let channel = context.open_channel()?;
    let uploader = FirmwareUploader::new(
        channel.publisher(),
        UploadSettings::from_config(&context.config),
    );
    let result = uploader.upload(file).await;
    channel.close().await;
    let report = result.with_context(|| format!("uploading {}", file.display()))?;

    println!(
        "Uploaded {} bytes in {} chunks (sha256 {})",
        report.total_bytes, report.chunks, report.sha256
    );
    println!("{}", context.config.ota.completion_marker);
    Ok(())
}

/// Stands in for pm2 on dry runs; every process starts and finishes at once.
struct DryRunSupervisor {
    marker: String,
}

#[async_trait]
impl ProcessSupervisor for DryRunSupervisor {
    async fn start(&self, process: &str) -> halow_supervisor::Result<()> {
        println!("dry-run: start {process}");
        Ok(())
    }

    async fn fetch_recent_logs(
        &self,
        process: &str,
        _lines: usize,
    ) -> halow_supervisor::Result<String> {
        Ok(format!("0|{process} | {}\n", self.marker))
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}

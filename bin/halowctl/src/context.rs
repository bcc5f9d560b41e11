//! ---
//! halow_section: "08-operator-cli"
//! halow_subsection: "binary"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Configuration, publisher and metrics wiring shared by subcommands."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use halow_common::AppConfig;
use halow_msg::{
    InMemoryPublisher, MessagePublisher, MeteredPublisher, MqttPublisher, PublishMetricsExporter,
};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::info;

const DEFAULT_CONFIG: &str = "configs/halow.toml";

/// Options accepted by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Configuration file (falls back to HALOW_CONFIG, then configs/halow.toml).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Record publishes in memory and simulate the process manager.
    #[arg(long = "dry-run", global = true, action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Write Prometheus metrics in text format to FILE on exit.
    #[arg(long, global = true, value_name = "FILE")]
    pub metrics: Option<PathBuf>,
}

/// Loaded configuration plus process-wide collaborators.
pub struct Context {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
    pub dry_run: bool,
    pub registry: Registry,
    metrics_path: Option<PathBuf>,
}

impl Context {
    pub fn load(options: &GlobalOptions) -> Result<Self> {
        let mut candidates = Vec::new();
        if let Some(path) = &options.config {
            if !path.exists() {
                anyhow::bail!("configuration file {} does not exist", path.display());
            }
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from(DEFAULT_CONFIG));
        let loaded = AppConfig::load_or_default(&candidates)?;
        Ok(Self {
            config: loaded.config,
            source: loaded.source,
            dry_run: options.dry_run,
            registry: Registry::new(),
            metrics_path: options.metrics.clone(),
        })
    }

    /// Open the publish channel configured for this invocation.
    pub fn open_channel(&self) -> Result<Channel> {
        let exporter = PublishMetricsExporter::register(&self.registry)
            .context("registering publish metrics")?;
        if self.dry_run {
            let recorder = InMemoryPublisher::new();
            let publisher = MeteredPublisher::new(Arc::new(recorder.clone()), exporter);
            return Ok(Channel {
                publisher: Arc::new(publisher),
                recorder: Some(recorder),
                mqtt: None,
            });
        }

        let mqtt = Arc::new(MqttPublisher::connect(&self.config.broker).with_context(|| {
            format!(
                "connecting to broker {}:{}",
                self.config.broker.host, self.config.broker.port
            )
        })?);
        let publisher = MeteredPublisher::new(mqtt.clone(), exporter);
        Ok(Channel {
            publisher: Arc::new(publisher),
            recorder: None,
            mqtt: Some(mqtt),
        })
    }

    pub fn write_metrics(&self) -> Result<()> {
        let Some(path) = &self.metrics_path else {
            return Ok(());
        };
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("encoding metrics")?;
        fs::write(path, buffer)
            .with_context(|| format!("writing metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
        Ok(())
    }
}

/// Publisher for one invocation and the handles needed to close it.
pub struct Channel {
    publisher: Arc<dyn MessagePublisher>,
    recorder: Option<InMemoryPublisher>,
    mqtt: Option<Arc<MqttPublisher>>,
}

impl Channel {
    pub fn publisher(&self) -> Arc<dyn MessagePublisher> {
        Arc::clone(&self.publisher)
    }

    /// Disconnect from the broker, or list the recorded publishes on a dry run.
    pub async fn close(self) {
        if let Some(mqtt) = &self.mqtt {
            mqtt.disconnect().await;
        }
        if let Some(recorder) = &self.recorder {
            for message in recorder.messages() {
                println!(
                    "dry-run: {} <- {} bytes",
                    message.topic,
                    message.payload.len()
                );
            }
        }
    }
}

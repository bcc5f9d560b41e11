//! ---
//! halow_section: "01-core-functionality"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Immutable process-wide configuration for the coordinator."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_broker_host() -> String {
    "localhost".to_owned()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "halowctl".to_owned()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

fn default_qos() -> u8 {
    1
}

fn default_ack_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_config_topic() -> String {
    "sensor/config".to_owned()
}

fn default_ota_start_topic() -> String {
    "sensor/ota/start".to_owned()
}

fn default_ota_chunk_topic() -> String {
    "sensor/ota/chunk".to_owned()
}

fn default_ota_done_topic() -> String {
    "sensor/ota/done".to_owned()
}

fn default_ota_process() -> String {
    "ota-bridge".to_owned()
}

fn default_downstream_process() -> String {
    "influx-bridge".to_owned()
}

fn default_completion_marker() -> String {
    "OTA_FINISHED".to_owned()
}

fn default_max_attempts() -> u32 {
    60
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_log_lines() -> usize {
    50
}

fn default_supervisor_binary() -> String {
    "pm2".to_owned()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_sleep_min() -> u32 {
    10
}

fn default_sleep_max() -> u32 {
    86_400
}

fn default_chunk_size() -> usize {
    128
}

fn default_chunk_delay() -> Duration {
    Duration::from_millis(10)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object, constructed once at startup and never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub topics: TopicConfig,
    #[serde(default)]
    pub ota: OtaConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub sleep: SleepConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults apply.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "HALOW_CONFIG";

    /// Load configuration from disk, respecting the `HALOW_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        let loaded = Self::load_or_default(candidates)?;
        match loaded.source {
            Some(_) => Ok(loaded.config),
            None => Err(anyhow!(
                "no configuration files found. inspected: {}",
                candidates
                    .iter()
                    .map(|p| p.as_ref().display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }

    /// Load configuration from the environment override or the first existing
    /// candidate, falling back to built-in defaults when nothing is found.
    pub fn load_or_default<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let candidate = candidate.as_ref();
            if candidate.exists() {
                let config = Self::from_path(candidate)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(candidate.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using built-in defaults");
        let config = AppConfig::default();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()?;
        self.topics.validate()?;
        self.ota.validate()?;
        self.supervisor.validate()?;
        self.sleep.validate()?;
        self.upload.validate()?;
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialise configuration to TOML")
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} must not be empty", field));
    }
    Ok(())
}

/// Publish/subscribe broker endpoint.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub keep_alive: Duration,
    /// MQTT quality of service level (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default = "default_ack_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ack_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: default_client_id(),
            keep_alive: default_keep_alive(),
            qos: default_qos(),
            ack_timeout: default_ack_timeout(),
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.host, "broker.host")?;
        require_non_empty(&self.client_id, "broker.client_id")?;
        if self.qos > 2 {
            return Err(anyhow!("broker.qos must be 0, 1 or 2 (got {})", self.qos));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic devices subscribe to for configuration commands.
    #[serde(default = "default_config_topic")]
    pub config: String,
    #[serde(default = "default_ota_start_topic")]
    pub ota_start: String,
    #[serde(default = "default_ota_chunk_topic")]
    pub ota_chunk: String,
    #[serde(default = "default_ota_done_topic")]
    pub ota_done: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            config: default_config_topic(),
            ota_start: default_ota_start_topic(),
            ota_chunk: default_ota_chunk_topic(),
            ota_done: default_ota_done_topic(),
        }
    }
}

impl TopicConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.config, "topics.config")?;
        require_non_empty(&self.ota_start, "topics.ota_start")?;
        require_non_empty(&self.ota_chunk, "topics.ota_chunk")?;
        require_non_empty(&self.ota_done, "topics.ota_done")?;
        Ok(())
    }
}

/// OTA rollout parameters consumed by the orchestrator.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtaConfig {
    #[serde(default = "default_ota_process")]
    pub process_name: String,
    #[serde(default = "default_downstream_process")]
    pub downstream_process: String,
    #[serde(default = "default_completion_marker")]
    pub completion_marker: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
    #[serde(default)]
    pub allow_concurrent_sessions: bool,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            process_name: default_ota_process(),
            downstream_process: default_downstream_process(),
            completion_marker: default_completion_marker(),
            max_attempts: default_max_attempts(),
            poll_interval: default_poll_interval(),
            log_lines: default_log_lines(),
            allow_concurrent_sessions: false,
        }
    }
}

impl OtaConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.process_name, "ota.process_name")?;
        require_non_empty(&self.downstream_process, "ota.downstream_process")?;
        require_non_empty(&self.completion_marker, "ota.completion_marker")?;
        if self.max_attempts == 0 {
            return Err(anyhow!("ota.max_attempts must be at least 1"));
        }
        if self.log_lines == 0 {
            return Err(anyhow!("ota.log_lines must be at least 1"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Process manager executable, resolved through `PATH` when relative.
    #[serde(default = "default_supervisor_binary")]
    pub binary: String,
    #[serde(default = "default_command_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub command_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary: default_supervisor_binary(),
            command_timeout: default_command_timeout(),
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<()> {
        require_non_empty(&self.binary, "supervisor.binary")
    }
}

/// Bounds accepted for the device sleep/report interval, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepConfig {
    #[serde(default = "default_sleep_min")]
    pub min_seconds: u32,
    #[serde(default = "default_sleep_max")]
    pub max_seconds: u32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            min_seconds: default_sleep_min(),
            max_seconds: default_sleep_max(),
        }
    }
}

impl SleepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_seconds == 0 {
            return Err(anyhow!("sleep.min_seconds must be at least 1"));
        }
        if self.min_seconds > self.max_seconds {
            return Err(anyhow!(
                "sleep.min_seconds ({}) exceeds sleep.max_seconds ({})",
                self.min_seconds,
                self.max_seconds
            ));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub chunk_delay: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay: default_chunk_delay(),
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("upload.chunk_size must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

impl LoggingConfig {
    /// Base name of the rolling log file for `service`; the appender adds the date.
    pub fn file_name(&self, service: &str) -> String {
        match self.file_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{service}.log"),
            _ => format!("{service}.log"),
        }
    }
}

//! ---
//! halow_section: "01-core-functionality"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Shared primitives for the coordinator workspace."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
//! Shared primitives for the HaLow fleet coordinator.
//! This crate exposes configuration loading and the tracing bootstrap
//! consumed across the workspace.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, BrokerConfig, LoadedAppConfig, LoggingConfig, OtaConfig, SleepConfig,
    SupervisorConfig, TopicConfig, UploadConfig,
};
pub use logging::{init_tracing, LogFormat};

//! ---
//! halow_section: "04-ota-orchestration"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "OTA orchestration kernel and device command handlers."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
//! Control plane for fleet firmware rollouts.
//!
//! [`OtaOrchestrator`] starts the managed update process, polls its output for
//! the completion marker and cascades into the ingestion bridge.
//! [`ConfigCommandHandler`] pushes the sleep interval to devices and
//! [`FirmwareUploader`] streams an image over the publish channel.
#![warn(missing_docs)]

pub mod command;
pub mod firmware;
pub mod metrics;
pub mod orchestrator;
pub mod session;
pub mod status;

pub use command::{CommandError, CommandSettings, ConfigCommandHandler};
pub use firmware::{FirmwareError, FirmwareUploader, UploadReport, UploadSettings};
pub use metrics::OtaMetrics;
pub use orchestrator::{OrchestratorError, OtaHandle, OtaOrchestrator, OtaSettings};
pub use session::{OtaReport, OtaSession, OtaStatus, SessionError};
pub use status::{StatusEvent, StatusSink};

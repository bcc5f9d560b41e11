//! ---
//! halow_section: "02-messaging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Message publisher capability, payload types and MQTT backend."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
//! Publish side of the device command channel.
#![warn(missing_docs)]

use std::time::Duration;

pub mod logging;
pub mod mqtt;
pub mod publisher;
pub mod qos;
pub mod types;

/// Shared result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Failures surfaced by a [`MessagePublisher`].
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The client rejected the publish request before it reached the broker.
    #[error("publish to '{topic}' failed: {detail}")]
    Publish {
        /// Destination topic.
        topic: String,
        /// Client diagnostic.
        detail: String,
    },
    /// The broker connection could not be established or was lost.
    #[error("broker connection failed: {0}")]
    Connection(String),
    /// The broker did not acknowledge the publish in time.
    #[error("no acknowledgement for '{topic}' within {timeout:?}")]
    AckTimeout {
        /// Destination topic.
        topic: String,
        /// Bound that elapsed.
        timeout: Duration,
    },
    /// Configured quality of service level is not an MQTT level.
    #[error("invalid quality of service level {0}; expected 0, 1 or 2")]
    InvalidQos(u8),
    /// Wrapper for JSON serialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use logging::{log_publish, MeteredPublisher, PublishMetricsExporter};
pub use mqtt::MqttPublisher;
pub use publisher::{InMemoryPublisher, MessagePublisher};
pub use qos::DeliveryGuarantee;
pub use types::{PublishedMessage, SleepCommand};

//! ---
//! halow_section: "05-device-commands"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Configuration command handler for device sleep intervals."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::Arc;

use halow_common::AppConfig;
use halow_msg::{MessagePublisher, MessagingError, SleepCommand};
use thiserror::Error;
use tracing::{info, warn};

use crate::status::StatusEvent;

/// Topic and bounds used by [`ConfigCommandHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSettings {
    /// Topic devices subscribe to for configuration.
    pub config_topic: String,
    /// Smallest accepted sleep interval in seconds.
    pub min_seconds: u32,
    /// Largest accepted sleep interval in seconds.
    pub max_seconds: u32,
}

impl CommandSettings {
    /// Derive the settings from the `[topics]` and `[sleep]` sections.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            config_topic: config.topics.config.clone(),
            min_seconds: config.sleep.min_seconds,
            max_seconds: config.sleep.max_seconds,
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Reasons a configuration command was not delivered.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The interval lies outside the configured bounds.
    #[error("Sleep interval {value}s is outside the allowed range {min}..={max}s")]
    OutOfRange {
        /// Rejected value.
        value: i64,
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },
    /// The payload could not be encoded.
    #[error("unable to encode sleep command: {0}")]
    Encode(#[source] MessagingError),
    /// The publisher reported a failure.
    #[error(transparent)]
    Publish(MessagingError),
}

/// Publishes configuration commands to the device fleet.
pub struct ConfigCommandHandler {
    publisher: Arc<dyn MessagePublisher>,
    settings: CommandSettings,
}

impl ConfigCommandHandler {
    /// Create a handler publishing through `publisher`.
    pub fn new(publisher: Arc<dyn MessagePublisher>, settings: CommandSettings) -> Self {
        Self {
            publisher,
            settings,
        }
    }

    /// Send the sleep interval and report the outcome as a status event.
    ///
    /// Success yields `info("Sleep interval sent: {value}s")`. Any failure
    /// yields an error event carrying the failure detail verbatim.
    pub async fn send_sleep_interval(&self, value: i64) -> StatusEvent {
        match self.try_send_sleep_interval(value).await {
            Ok(sleep) => StatusEvent::info(format!("Sleep interval sent: {sleep}s")),
            Err(err) => StatusEvent::error(err.to_string()),
        }
    }

    /// Validate, encode and publish the sleep interval, returning the value sent.
    pub async fn try_send_sleep_interval(&self, value: i64) -> Result<u32, CommandError> {
        let sleep = self.validate(value)?;
        let payload = SleepCommand::new(sleep)
            .to_payload()
            .map_err(CommandError::Encode)?;
        let topic = &self.settings.config_topic;

        match self.publisher.publish(topic, payload).await {
            Ok(()) => {
                info!(topic = %topic, sleep, backend = self.publisher.name(), "sleep interval published");
                Ok(sleep)
            }
            Err(err) => {
                warn!(topic = %topic, sleep, error = %err, "sleep interval publish failed");
                Err(CommandError::Publish(err))
            }
        }
    }

    fn validate(&self, value: i64) -> Result<u32, CommandError> {
        let CommandSettings {
            min_seconds,
            max_seconds,
            ..
        } = self.settings;
        let out_of_range = CommandError::OutOfRange {
            value,
            min: min_seconds,
            max: max_seconds,
        };
        match u32::try_from(value) {
            Ok(sleep) if (min_seconds..=max_seconds).contains(&sleep) => Ok(sleep),
            _ => {
                warn!(value, min_seconds, max_seconds, "sleep interval rejected");
                Err(out_of_range)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halow_msg::InMemoryPublisher;

    fn handler() -> (ConfigCommandHandler, InMemoryPublisher) {
        let publisher = InMemoryPublisher::new();
        let handler =
            ConfigCommandHandler::new(Arc::new(publisher.clone()), CommandSettings::default());
        (handler, publisher)
    }

    #[tokio::test]
    async fn bounds_are_inclusive() {
        let (handler, publisher) = handler();
        assert!(!handler.send_sleep_interval(10).await.is_error());
        assert!(!handler.send_sleep_interval(86_400).await.is_error());
        assert_eq!(publisher.messages().len(), 2);
    }

    #[tokio::test]
    async fn negative_and_oversized_values_are_rejected() {
        let (handler, publisher) = handler();
        for value in [-5, 0, 9, 86_401, i64::from(u32::MAX) + 1] {
            let event = handler.send_sleep_interval(value).await;
            assert!(event.is_error(), "{value} should be rejected");
        }
        assert!(publisher.messages().is_empty());
    }

    #[test]
    fn settings_follow_configuration() {
        let mut config = AppConfig::default();
        config.topics.config = "lab/config".into();
        config.sleep.max_seconds = 3_600;
        let settings = CommandSettings::from_config(&config);
        assert_eq!(settings.config_topic, "lab/config");
        assert_eq!(settings.min_seconds, 10);
        assert_eq!(settings.max_seconds, 3_600);
    }
}

//! ---
//! halow_section: "05-device-commands"
//! halow_subsection: "tests"
//! halow_type: "test"
//! halow_scope: "code"
//! halow_description: "Sleep interval command scenarios."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::Arc;

use halow_core::{CommandError, CommandSettings, ConfigCommandHandler, StatusEvent};
use halow_msg::{InMemoryPublisher, SleepCommand};
use halow_testharness::FailingPublisher;

#[tokio::test]
async fn sleep_interval_is_published_as_json_on_config_topic() {
    let publisher = InMemoryPublisher::new();
    let handler =
        ConfigCommandHandler::new(Arc::new(publisher.clone()), CommandSettings::default());

    let event = handler.send_sleep_interval(600).await;

    assert_eq!(event, StatusEvent::info("Sleep interval sent: 600s"));
    let messages = publisher.take();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "sensor/config");
    let decoded: SleepCommand = serde_json::from_slice(&messages[0].payload).expect("json");
    assert_eq!(decoded, SleepCommand::new(600));
}

#[tokio::test]
async fn publish_failure_is_reported_verbatim() {
    let publisher = FailingPublisher::new("[Errno 111] Connection refused");
    let handler =
        ConfigCommandHandler::new(Arc::new(publisher.clone()), CommandSettings::default());

    let event = handler.send_sleep_interval(600).await;

    assert!(event.is_error());
    assert_eq!(
        event.message(),
        publisher.error_for("sensor/config").to_string()
    );
    assert!(event.message().contains("[Errno 111] Connection refused"));
    assert_eq!(publisher.attempts(), 1);
}

#[tokio::test]
async fn out_of_range_value_is_rejected_before_publishing() {
    let publisher = InMemoryPublisher::new();
    let handler =
        ConfigCommandHandler::new(Arc::new(publisher.clone()), CommandSettings::default());

    let event = handler.send_sleep_interval(5).await;
    assert_eq!(
        event,
        StatusEvent::error("Sleep interval 5s is outside the allowed range 10..=86400s")
    );

    let err = handler
        .try_send_sleep_interval(100_000)
        .await
        .expect_err("above bound");
    assert!(matches!(
        err,
        CommandError::OutOfRange {
            value: 100_000,
            min: 10,
            max: 86_400
        }
    ));
    assert!(publisher.messages().is_empty());
}

#[tokio::test]
async fn custom_topic_and_bounds_apply() {
    let publisher = InMemoryPublisher::new();
    let settings = CommandSettings {
        config_topic: "lab/sensor/config".into(),
        min_seconds: 1,
        max_seconds: 60,
    };
    let handler = ConfigCommandHandler::new(Arc::new(publisher.clone()), settings);

    assert_eq!(handler.try_send_sleep_interval(1).await.expect("in range"), 1);
    assert!(handler.send_sleep_interval(61).await.is_error());
    let messages = publisher.take();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "lab/sensor/config");
    assert_eq!(messages[0].payload_str(), r#"{"sleep":1}"#);
}

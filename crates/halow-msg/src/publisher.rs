//! ---
//! halow_section: "02-messaging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Publisher capability trait and in-memory backend."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::PublishedMessage;
use crate::Result;

/// Capability to publish a payload on a topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync + 'static {
    /// Publish `payload` on `topic`, resolving once the configured delivery
    /// guarantee is satisfied.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Human-readable backend name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// In-memory publisher recording every message, used for dry runs and tests.
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl InMemoryPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every message published so far.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    /// Drain the recorded messages.
    pub fn take(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.messages.lock())
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.messages.lock().push(PublishedMessage {
            topic: topic.to_owned(),
            payload,
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_publisher_records_in_order() {
        let publisher = InMemoryPublisher::new();
        publisher
            .publish("sensor/config", br#"{"sleep":600}"#.to_vec())
            .await
            .expect("publish");
        publisher
            .publish("sensor/ota/done", Vec::new())
            .await
            .expect("publish");

        let messages = publisher.take();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].topic, "sensor/config");
        assert_eq!(messages[0].payload_str(), r#"{"sleep":600}"#);
        assert!(messages[1].payload.is_empty());
        assert!(publisher.messages().is_empty());
    }
}

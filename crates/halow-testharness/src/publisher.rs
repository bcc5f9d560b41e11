//! ---
//! halow_section: "07-test-harness"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Publisher that rejects every message."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use halow_msg::{MessagePublisher, MessagingError, Result};

/// Publisher whose every publish fails with a fixed client diagnostic.
#[derive(Debug, Clone)]
pub struct FailingPublisher {
    detail: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingPublisher {
    /// Fail every publish with `detail`.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The error returned for a publish on `topic`.
    pub fn error_for(&self, topic: &str) -> MessagingError {
        MessagingError::Publish {
            topic: topic.to_owned(),
            detail: self.detail.clone(),
        }
    }

    /// Number of publishes attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagePublisher for FailingPublisher {
    async fn publish(&self, topic: &str, _payload: Vec<u8>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error_for(topic))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

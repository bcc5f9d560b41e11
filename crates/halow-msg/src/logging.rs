//! ---
//! halow_section: "02-messaging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Publish logging and Prometheus instrumentation."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use tracing::{debug, warn};

use crate::publisher::MessagePublisher;
use crate::Result;

/// Emit a structured log entry for a publish attempt.
pub fn log_publish(backend: &str, topic: &str, bytes: usize) {
    debug!(backend, topic, bytes, "publishing message");
}

/// Prometheus metric handles for publish activity.
#[derive(Clone)]
pub struct PublishMetricsExporter {
    published: IntCounter,
    failed: IntCounter,
    latency: Histogram,
}

impl PublishMetricsExporter {
    /// Register publish metrics with the provided registry.
    pub fn register(registry: &Registry) -> std::result::Result<Self, prometheus::Error> {
        let published = IntCounter::with_opts(Opts::new(
            "messages_published_total",
            "Messages accepted by the publish channel",
        ))?;
        let failed = IntCounter::with_opts(Opts::new(
            "messages_publish_failed_total",
            "Messages the publish channel failed to deliver",
        ))?;
        let latency = Histogram::with_opts(HistogramOpts::new(
            "message_publish_latency_seconds",
            "Time between publish request and delivery confirmation",
        ))?;

        registry.register(Box::new(published.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            published,
            failed,
            latency,
        })
    }

    /// Record a delivered message.
    pub fn observe_published(&self) {
        self.published.inc();
    }

    /// Record a failed publish.
    pub fn observe_failed(&self) {
        self.failed.inc();
    }

    /// Record publish latency.
    pub fn observe_latency(&self, duration: Duration) {
        self.latency.observe(duration.as_secs_f64());
    }
}

/// Publisher decorator that logs and meters every publish.
pub struct MeteredPublisher {
    inner: Arc<dyn MessagePublisher>,
    metrics: PublishMetricsExporter,
}

impl MeteredPublisher {
    /// Wrap `inner`, recording into `metrics`.
    pub fn new(inner: Arc<dyn MessagePublisher>, metrics: PublishMetricsExporter) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl MessagePublisher for MeteredPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        log_publish(self.inner.name(), topic, payload.len());
        let started = Instant::now();
        let result = self.inner.publish(topic, payload).await;
        self.metrics.observe_latency(started.elapsed());
        match &result {
            Ok(()) => self.metrics.observe_published(),
            Err(err) => {
                warn!(backend = self.inner.name(), topic, error = %err, "publish failed");
                self.metrics.observe_failed();
            }
        }
        result
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryPublisher;

    #[tokio::test]
    async fn metered_publisher_counts_deliveries() {
        let registry = Registry::new();
        let metrics = PublishMetricsExporter::register(&registry).expect("register metrics");
        let inner = InMemoryPublisher::new();
        let publisher = MeteredPublisher::new(Arc::new(inner.clone()), metrics);

        publisher
            .publish("sensor/config", b"{}".to_vec())
            .await
            .expect("publish");

        assert_eq!(inner.messages().len(), 1);
        let families = registry.gather();
        let published = families
            .iter()
            .find(|f| f.get_name() == "messages_published_total")
            .expect("counter registered");
        assert_eq!(published.get_metric()[0].get_counter().get_value(), 1.0);
        assert_eq!(publisher.name(), "in_memory");
    }
}

//! ---
//! halow_section: "02-messaging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "MQTT publisher backed by rumqttc."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use halow_common::config::BrokerConfig;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::publisher::MessagePublisher;
use crate::qos::DeliveryGuarantee;
use crate::{MessagingError, Result};

const REQUEST_CAPACITY: usize = 16;
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Outcome delivered to a waiting publish: `Err` carries the connection failure.
type Confirmation = std::result::Result<(), String>;
type Waiter = Option<oneshot::Sender<Confirmation>>;

/// Pairs broker confirmations with the publish that produced them.
///
/// The client writes requests in submission order, so the n-th outgoing
/// `PUBLISH` belongs to the n-th queued waiter. From then on the waiter is
/// keyed by the packet id the client assigned, and only a `PUBACK`/`PUBCOMP`
/// carrying that id completes it. Slots of abandoned publishes stay in place
/// (with the sender dropped) so later publishes keep their position.
#[derive(Debug, Default)]
struct DeliveryTracker {
    queued: VecDeque<Waiter>,
    in_flight: HashMap<u16, Waiter>,
}

impl DeliveryTracker {
    fn enqueue(&mut self) -> oneshot::Receiver<Confirmation> {
        let (tx, rx) = oneshot::channel();
        self.queued.push_back(Some(tx));
        rx
    }

    /// Drop the most recent slot when its request never reached the client.
    fn withdraw_last(&mut self) {
        self.queued.pop_back();
    }

    fn sent(&mut self, pkid: u16, awaits_ack: bool) {
        // Retransmission after a reconnect; the waiter is already keyed.
        if awaits_ack && self.in_flight.contains_key(&pkid) {
            return;
        }
        let Some(waiter) = self.queued.pop_front() else {
            debug!(pkid, "outgoing publish without a registered waiter");
            return;
        };
        if awaits_ack {
            self.in_flight.insert(pkid, waiter);
        } else if let Some(tx) = waiter {
            let _ = tx.send(Ok(()));
        }
    }

    fn acknowledged(&mut self, pkid: u16) {
        match self.in_flight.remove(&pkid) {
            Some(Some(tx)) => {
                let _ = tx.send(Ok(()));
            }
            Some(None) => debug!(pkid, "late acknowledgement for an abandoned publish"),
            None => debug!(pkid, "acknowledgement for an unknown packet id"),
        }
    }

    fn fail_all(&mut self, detail: &str) {
        for waiter in self.queued.iter_mut().chain(self.in_flight.values_mut()) {
            if let Some(tx) = waiter.take() {
                let _ = tx.send(Err(detail.to_owned()));
            }
        }
    }
}

/// Publisher holding one broker session whose event loop runs on a background task.
///
/// Each publish completes on its own delivery confirmation (packet written for
/// QoS 0, the matching `PUBACK` for QoS 1, the matching `PUBCOMP` for QoS 2)
/// or fails once `ack_timeout` elapses.
pub struct MqttPublisher {
    client: AsyncClient,
    guarantee: DeliveryGuarantee,
    ack_timeout: Duration,
    tracker: Arc<Mutex<DeliveryTracker>>,
    submit: tokio::sync::Mutex<()>,
    driver: JoinHandle<()>,
}

impl MqttPublisher {
    /// Open a session against the configured broker. Must be called inside a tokio runtime.
    pub fn connect(config: &BrokerConfig) -> Result<Self> {
        let guarantee = DeliveryGuarantee::from_level(config.qos)?;
        // Unique per process so concurrent operator shells do not evict each other.
        let client_id = format!("{}-{}", config.client_id, std::process::id());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive.max(MIN_KEEP_ALIVE));

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let tracker = Arc::new(Mutex::new(DeliveryTracker::default()));
        let driver = tokio::spawn(drive(
            eventloop,
            Arc::clone(&tracker),
            guarantee.awaits_ack(),
        ));
        info!(host = %config.host, port = config.port, ?guarantee, "mqtt publisher ready");

        Ok(Self {
            client,
            guarantee,
            ack_timeout: config.ack_timeout,
            tracker,
            submit: tokio::sync::Mutex::new(()),
            driver,
        })
    }

    /// Send a `DISCONNECT` to the broker. Errors are logged and otherwise ignored.
    pub async fn disconnect(&self) {
        if let Err(err) = self.client.disconnect().await {
            debug!(error = %err, "mqtt disconnect request failed");
        }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    mut eventloop: EventLoop,
    tracker: Arc<Mutex<DeliveryTracker>>,
    awaits_ack: bool,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => tracker.lock().sent(pkid, awaits_ack),
            Ok(Event::Incoming(Packet::PubAck(ack))) => tracker.lock().acknowledged(ack.pkid),
            Ok(Event::Incoming(Packet::PubComp(comp))) => tracker.lock().acknowledged(comp.pkid),
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!(code = ?ack.code, "mqtt connection acknowledged");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "mqtt event loop error");
                tracker.lock().fail_all(&err.to_string());
                tokio::time::sleep(RECONNECT_BACKOFF).await;
            }
        }
    }
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let confirmation = {
            // Registration and submission must happen in the same order.
            let _submit = self.submit.lock().await;
            let confirmation = self.tracker.lock().enqueue();
            if let Err(err) = self
                .client
                .publish(topic, self.guarantee.as_qos(), false, payload)
                .await
            {
                self.tracker.lock().withdraw_last();
                return Err(MessagingError::Publish {
                    topic: topic.to_owned(),
                    detail: err.to_string(),
                });
            }
            confirmation
        };

        match tokio::time::timeout(self.ack_timeout, confirmation).await {
            Err(_) => Err(MessagingError::AckTimeout {
                topic: topic.to_owned(),
                timeout: self.ack_timeout,
            }),
            Ok(Err(_)) => Err(MessagingError::Connection(
                "mqtt event loop stopped".to_owned(),
            )),
            Ok(Ok(Err(detail))) => Err(MessagingError::Connection(detail)),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

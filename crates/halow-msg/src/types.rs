//! ---
//! halow_section: "02-messaging"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Wire payloads published to devices."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::Result;

/// Configuration command instructing devices to change their sleep/report interval.
///
/// Serialises to the single-field JSON record devices expect: `{"sleep":600}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepCommand {
    /// Interval in seconds.
    pub sleep: u32,
}

impl SleepCommand {
    /// Construct a command for the given interval.
    pub fn new(sleep: u32) -> Self {
        Self { sleep }
    }

    /// Encode the command as a JSON payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A message as handed to the publish channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Payload rendered as UTF-8, replacing invalid sequences.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

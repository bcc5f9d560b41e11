//! ---
//! halow_section: "07-test-harness"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Status sink recording every event."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
use std::sync::Arc;

use halow_core::{StatusEvent, StatusSink};
use parking_lot::Mutex;

/// Records status events in arrival order. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

impl CollectingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event so far.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    /// Error events only.
    pub fn errors(&self) -> Vec<String> {
        self.filtered(true)
    }

    /// Informational events only.
    pub fn infos(&self) -> Vec<String> {
        self.filtered(false)
    }

    fn filtered(&self, errors: bool) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.is_error() == errors)
            .map(|event| event.message().to_owned())
            .collect()
    }
}

impl StatusSink for CollectingSink {
    fn emit(&self, event: StatusEvent) {
        self.events.lock().push(event);
    }
}

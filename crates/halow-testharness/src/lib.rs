//! ---
//! halow_section: "07-test-harness"
//! halow_subsection: "module"
//! halow_type: "source"
//! halow_scope: "code"
//! halow_description: "Scripted collaborators shared by the integration suites."
//! halow_version: "v0.1.0"
//! halow_owner: "tbd"
//! ---
//! Deterministic stand-ins for the external collaborators of the OTA control
//! plane: the process supervisor, the publish channel and the operator shell.

mod publisher;
mod sink;
mod supervisor;

pub use publisher::FailingPublisher;
pub use sink::CollectingSink;
pub use supervisor::{ScriptedSupervisor, SupervisorCall};

//! Job coordination for repodocs: per-job broadcast channels and
//! single-flight execution.
//!
//! Two process-wide tables live here with documented lifecycle rules:
//! the channel registry ([`ProgressBus`]) and the in-flight job registry
//! ([`JobCoordinator`]). The bus never deletes a channel on its own;
//! the coordinator removes a channel only once the job has settled and
//! no subscriber remains.

pub mod bus;
pub mod coordinator;

pub use bus::{JobEvent, ProgressBus};
pub use coordinator::{DEFAULT_WAIT_TIMEOUT, JobCoordinator};

//! Pipeline entry points for crawler operations.
//!
//! - `RunCoordinator::run_once`: Crawl every pending site once
//! - `run_every`: Trigger `run_once` on a fixed period

pub mod coordinator;
pub mod schedule;

pub use coordinator::{RunCoordinator, RunOutcome, RunReport};
pub use schedule::run_every;

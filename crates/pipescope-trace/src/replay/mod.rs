//! Replay - Time-scrubbing reconstruction of DAG node activity
//!
//! The engine answers "what did the pipeline look like T milliseconds into
//! the run" from the event log alone. Playback drives it from a timer, and
//! invocation grouping splits a repeated step into its individual runs.

mod engine;
mod invocation;
mod playback;

pub use engine::{ReplayEngine, ReplaySnapshot, StepTiming};
pub use invocation::{group_by_invocation, invocation_steps};
pub use playback::{Playback, ReplaySession};

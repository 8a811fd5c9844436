//! Pipescope Trace - Trace reconstruction and replay engine
//!
//! This crate turns the ordered event log of a DAG pipeline run into the
//! structures a run viewer needs:
//! - Event: Event, timeline and run schemas, typed payloads
//! - Processor: Per-step records and the finish payload
//! - Failure: Classified failures and diagnostics reported at finish
//! - Critical path: The chain of step intervals bounding the run duration
//! - Replay: Time-indexed node state for scrubbing and playback

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod critical_path;
pub mod error;
pub mod event;
pub mod failure;
pub mod metrics;
pub mod observe;
pub mod processor;
pub mod query;
pub mod replay;
pub mod source;
pub mod step;
pub mod timeline;
pub mod view;

pub use critical_path::compute_critical_path;
pub use error::{Error, Result};
pub use event::{EventPayload, EventType, PipelineEvent, Run, RunStatus, TimelineEntry};
pub use failure::{FailureKind, FailureReason, FailureRecord, FailureSource};
pub use metrics::{FinishPayload, RuntimeMetrics};
pub use observe::{ObservableSet, SetChange};
pub use processor::{extract_finish_payload, process_events, process_invocation_events};
pub use replay::{
    group_by_invocation, invocation_steps, Playback, ReplayEngine, ReplaySession,
    ReplaySnapshot, StepTiming,
};
pub use source::{InMemoryRunSource, RunBundle, RunSource};
pub use step::{ProcessedStep, StepStatus};
pub use timeline::{peak_concurrency, timeline_bounds, timeline_duration_ms};
pub use view::TraceView;

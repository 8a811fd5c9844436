//! Query - Lookups over a raw event log

use serde_json::Value;

use crate::event::{EventPayload, EventType, PipelineEvent};

/// Events of the given type, in log order
#[must_use]
pub fn filter_by_type(events: &[PipelineEvent], event_type: EventType) -> Vec<&PipelineEvent> {
    events.iter().filter(|e| e.event_type == event_type).collect()
}

/// Names of started steps, one entry per `step_start`
#[must_use]
pub fn step_starts(events: &[PipelineEvent]) -> Vec<&str> {
    events
        .iter()
        .filter(|e| e.event_type == EventType::StepStart && e.is_step_scoped())
        .filter_map(|e| e.step_name.as_deref())
        .collect()
}

/// Streamed token values, in log order
#[must_use]
pub fn tokens(events: &[PipelineEvent]) -> Vec<&Value> {
    events
        .iter()
        .filter_map(|e| match e.payload() {
            EventPayload::Token(Some(value)) => Some(value),
            _ => None,
        })
        .collect()
}

/// Whether the step started at least once
#[must_use]
pub fn was_called(events: &[PipelineEvent], step: &str) -> bool {
    step_starts(events).contains(&step)
}

/// First error message, optionally restricted to one step
#[must_use]
pub fn find_error(events: &[PipelineEvent], step: Option<&str>) -> Option<String> {
    events
        .iter()
        .filter(|e| step.is_none_or(|s| e.step_name.as_deref() == Some(s)))
        .find_map(|e| match e.payload() {
            EventPayload::StepError(p) => p.error,
            _ => None,
        })
}

//! Processor - Event log to per-step records
//!
//! Pure transformation from the ordered event log of a run to one
//! [`ProcessedStep`] per step name. Payload problems never fail the
//! transformation; they leave the affected fields unset.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::event::{EventPayload, EventType, PipelineEvent};
use crate::metrics::FinishPayload;
use crate::step::{ProcessedStep, StepStatus};

/// Build per-step records, ordered by each step's first appearance in the
/// log.
///
/// Run-level events (no step name, or the `system` step) are skipped. A
/// step's record is opened by its first `step_start`; ends and errors for a
/// step that never started are ignored here and only surface in replay.
/// Events seen before that start (barrier waits, tokens) still fix the
/// step's position in the output.
#[must_use]
pub fn process_events(events: &[PipelineEvent]) -> Vec<ProcessedStep> {
    let mut steps: Vec<(usize, ProcessedStep)> = Vec::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for (pos, event) in events.iter().enumerate().filter(|(_, e)| e.is_step_scoped()) {
        let Some(name) = event.step_name.as_deref() else {
            continue;
        };
        let seen_at = *first_seen.entry(name).or_insert(pos);

        let slot = match index.get(name) {
            Some(&slot) => slot,
            None if event.event_type == EventType::StepStart => {
                steps.push((seen_at, ProcessedStep::new(name)));
                index.insert(name, steps.len() - 1);
                steps.len() - 1
            }
            None => {
                trace!(step = name, seq = event.seq, event_type = %event.event_type, "Event before first step_start");
                continue;
            }
        };

        apply_event(&mut steps[slot].1, event);
    }

    steps.sort_by_key(|(seen_at, _)| *seen_at);

    debug!(events = events.len(), steps = steps.len(), "Processed event log");
    steps.into_iter().map(|(_, step)| step).collect()
}

/// Build the record for a single invocation's events.
///
/// The events are expected to be one step's events from one `step_start`
/// onwards (see [`crate::replay::group_by_invocation`]). Returns `None` when
/// there are no events.
#[must_use]
pub fn process_invocation_events<'a, I>(events: I) -> Option<ProcessedStep>
where
    I: IntoIterator<Item = &'a PipelineEvent>,
{
    let mut events = events.into_iter().peekable();
    events.peek()?;

    let mut step = ProcessedStep::default();
    for event in events {
        if step.name.is_empty() {
            if let Some(name) = &event.step_name {
                step.name = name.clone();
            }
        }
        apply_event(&mut step, event);
    }
    Some(step)
}

/// Find the payload of the last `finish` event that carries data.
#[must_use]
pub fn extract_finish_payload(events: &[PipelineEvent]) -> Option<FinishPayload> {
    events
        .iter()
        .rev()
        .find_map(|event| match event.payload() {
            EventPayload::Finish(Some(summary)) => Some(FinishPayload::new(summary.clone())),
            _ => None,
        })
}

fn apply_event(step: &mut ProcessedStep, event: &PipelineEvent) {
    match event.payload() {
        EventPayload::StepStart(payload) => {
            step.start_time = Some(event.timestamp.clone());
            step.attempts += 1;
            step.status = StepStatus::Running;
            if let Some(input) = payload.input {
                step.input_payload = Some(input.clone());
            }
            if let Some(kind) = payload.kind {
                step.kind = Some(kind.to_string());
            }
        }
        EventPayload::StepEnd(payload) => {
            step.end_time = Some(event.timestamp.clone());
            step.status = StepStatus::Success;
            if let Some(output) = payload.output {
                step.output_payload = Some(output.clone());
            }
            if let Some(duration_s) = payload.duration_s {
                step.duration_ms = Some(duration_s * 1000.0);
            }
            if let Some(meta) = payload.meta {
                for (key, value) in meta {
                    step.meta.insert(key.clone(), value.clone());
                }
            }
        }
        EventPayload::StepError(payload) => {
            step.end_time = Some(event.timestamp.clone());
            step.status = StepStatus::Failed;
            step.error = payload.error;
            if let Some(duration_s) = payload.duration_s {
                step.duration_ms = Some(duration_s * 1000.0);
            }
        }
        EventPayload::Finish(_) | EventPayload::Token(_) | EventPayload::Other(_) => {}
    }
}

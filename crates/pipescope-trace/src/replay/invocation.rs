//! Invocation grouping - Split a repeated step into its individual runs

use crate::event::{EventType, PipelineEvent};
use crate::processor::process_invocation_events;
use crate::step::ProcessedStep;

/// Partition a step's events into invocations.
///
/// Each `step_start` opens a new group and every later event of the step
/// joins the current group until the next `step_start`. Events before the
/// first start belong to no invocation and are dropped. The Nth group is the
/// Nth run of the step.
#[must_use]
pub fn group_by_invocation<'a>(events: &'a [PipelineEvent], step: &str) -> Vec<Vec<&'a PipelineEvent>> {
    let mut groups: Vec<Vec<&PipelineEvent>> = Vec::new();

    for event in events.iter().filter(|e| e.step_name.as_deref() == Some(step)) {
        if event.event_type == EventType::StepStart {
            groups.push(vec![event]);
        } else if let Some(current) = groups.last_mut() {
            current.push(event);
        }
    }

    groups
}

/// One record per invocation of `step`, in invocation order
#[must_use]
pub fn invocation_steps(events: &[PipelineEvent], step: &str) -> Vec<ProcessedStep> {
    group_by_invocation(events, step)
        .into_iter()
        .filter_map(|group| process_invocation_events(group))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepStatus;
    use serde_json::json;

    fn ev(seq: i64, event_type: EventType, step: &str) -> PipelineEvent {
        PipelineEvent::new(seq, event_type, "2024-01-01T00:00:00Z").with_step(step)
    }

    #[test]
    fn test_two_invocations() {
        let events = vec![
            ev(1, EventType::StepStart, "a"),
            ev(2, EventType::StepEnd, "a"),
            ev(3, EventType::StepStart, "a"),
            ev(4, EventType::StepError, "a"),
        ];
        let groups = group_by_invocation(&events, "a");

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 2));
        assert_eq!(groups[0][0].seq, 1);
        assert_eq!(groups[1][1].seq, 4);
    }

    #[test]
    fn test_other_steps_and_leading_events_ignored() {
        let events = vec![
            ev(1, EventType::Token, "a"),
            ev(2, EventType::StepStart, "b"),
            ev(3, EventType::StepStart, "a"),
            ev(4, EventType::StepEnd, "b"),
            ev(5, EventType::Token, "a"),
            ev(6, EventType::StepEnd, "a"),
        ];
        let groups = group_by_invocation(&events, "a");

        assert_eq!(groups.len(), 1);
        let seqs: Vec<i64> = groups[0].iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 5, 6]);
        assert!(group_by_invocation(&events, "missing").is_empty());
    }

    #[test]
    fn test_invocation_steps() {
        let events = vec![
            ev(1, EventType::StepStart, "a").with_data(json!({"input": 1})),
            ev(2, EventType::StepEnd, "a").with_data(json!({"output": "one"})),
            ev(3, EventType::StepStart, "a").with_data(json!({"input": 2})),
            ev(4, EventType::StepError, "a").with_data(json!({"error": "boom"})),
        ];
        let runs = invocation_steps(&events, "a");

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].status, StepStatus::Success);
        assert_eq!(runs[0].input_payload, Some(json!(1)));
        assert_eq!(runs[0].output_payload, Some(json!("one")));
        assert_eq!(runs[1].status, StepStatus::Failed);
        assert_eq!(runs[1].input_payload, Some(json!(2)));
        assert_eq!(runs[1].output_payload, None);
        assert!(runs.iter().all(|r| r.attempts == 1));
    }
}

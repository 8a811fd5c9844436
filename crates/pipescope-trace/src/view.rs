//! View - Derived data for one run, recomputed on input identity change
//!
//! Inputs are shared as `Arc` slices. Handing the view the same `Arc` again
//! is a no-op; a different `Arc` triggers a full recompute, even if the
//! contents happen to be equal.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::critical_path::compute_critical_path;
use crate::event::{PipelineEvent, TimelineEntry};
use crate::metrics::{FinishPayload, RuntimeMetrics};
use crate::processor::{extract_finish_payload, process_events};
use crate::step::ProcessedStep;

/// Read-only derived views over a run's events and timeline
#[derive(Debug, Clone)]
pub struct TraceView {
    events: Arc<[PipelineEvent]>,
    timeline: Arc<[TimelineEntry]>,
    steps: Vec<ProcessedStep>,
    finish: Option<FinishPayload>,
    critical_path: BTreeSet<String>,
}

impl Default for TraceView {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceView {
    /// Create a view with no data
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::from(Vec::new()),
            timeline: Arc::from(Vec::new()),
            steps: Vec::new(),
            finish: None,
            critical_path: BTreeSet::new(),
        }
    }

    /// Replace the event log. Returns whether derived data was recomputed.
    pub fn set_events(&mut self, events: &Arc<[PipelineEvent]>) -> bool {
        if Arc::ptr_eq(&self.events, events) {
            return false;
        }
        self.events = Arc::clone(events);
        self.steps = process_events(&self.events);
        self.finish = extract_finish_payload(&self.events);
        debug!(steps = self.steps.len(), "Recomputed step view");
        true
    }

    /// Replace the timeline. Returns whether the critical path was recomputed.
    pub fn set_timeline(&mut self, timeline: &Arc<[TimelineEntry]>) -> bool {
        if Arc::ptr_eq(&self.timeline, timeline) {
            return false;
        }
        self.timeline = Arc::clone(timeline);
        self.critical_path = compute_critical_path(&self.timeline);
        true
    }

    /// Event log the view was built from
    #[must_use]
    pub fn events(&self) -> &Arc<[PipelineEvent]> {
        &self.events
    }

    /// Timeline the view was built from
    #[must_use]
    pub fn timeline(&self) -> &Arc<[TimelineEntry]> {
        &self.timeline
    }

    /// Per-step records
    #[must_use]
    pub fn steps(&self) -> &[ProcessedStep] {
        &self.steps
    }

    /// Record for one step
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&ProcessedStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Finish payload of the run, if it finished
    #[must_use]
    pub fn finish(&self) -> Option<&FinishPayload> {
        self.finish.as_ref()
    }

    /// Metrics from the finish payload, falling back to counters derived
    /// from the event log
    #[must_use]
    pub fn metrics(&self) -> RuntimeMetrics {
        self.finish
            .as_ref()
            .and_then(FinishPayload::metrics)
            .unwrap_or_else(|| RuntimeMetrics::from_events(&self.events))
    }

    /// Step names on the critical path
    #[must_use]
    pub fn critical_path(&self) -> &BTreeSet<String> {
        &self.critical_path
    }

    /// Whether a step lies on the critical path
    #[must_use]
    pub fn is_critical(&self, name: &str) -> bool {
        self.critical_path.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use serde_json::json;

    fn events() -> Arc<[PipelineEvent]> {
        let t = "2024-01-01T00:00:00Z";
        Arc::from(vec![
            PipelineEvent::new(1, EventType::StepStart, t).with_step("a"),
            PipelineEvent::new(2, EventType::Token, t).with_step("a"),
            PipelineEvent::new(3, EventType::StepEnd, t).with_step("a"),
        ])
    }

    #[test]
    fn test_recompute_only_on_new_arc() {
        let mut view = TraceView::new();
        let log = events();

        assert!(view.set_events(&log));
        assert!(!view.set_events(&log));
        assert_eq!(view.steps().len(), 1);

        // equal contents, different identity
        assert!(view.set_events(&events()));
    }

    #[test]
    fn test_timeline_recompute() {
        let mut view = TraceView::new();
        let timeline: Arc<[TimelineEntry]> = Arc::from(vec![TimelineEntry::new(
            "a",
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:01Z",
        )]);

        assert!(view.set_timeline(&timeline));
        assert!(!view.set_timeline(&timeline));
        assert!(view.is_critical("a"));
        assert!(!view.is_critical("b"));
    }

    #[test]
    fn test_metrics_fallback() {
        let mut view = TraceView::new();
        view.set_events(&events());
        assert!(view.finish().is_none());
        assert_eq!(view.metrics().tokens, 1);

        let mut log = events().to_vec();
        log.push(
            PipelineEvent::new(4, EventType::Finish, "2024-01-01T00:00:01Z")
                .with_data(json!({"payload": {"metrics": {"tokens": 40}}})),
        );
        view.set_events(&Arc::from(log));
        assert_eq!(view.metrics().tokens, 40);
        assert!(view.step("a").is_some());
    }
}

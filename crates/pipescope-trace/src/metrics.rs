//! Metrics - Finish payload and aggregate runtime metrics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{EventPayload, EventType, PipelineEvent};
use crate::failure::FailureRecord;

/// Summary carried by a run's terminal `finish` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinishPayload {
    raw: Value,
}

impl FinishPayload {
    /// Wrap an already unwrapped finish summary
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The summary as recorded
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Terminal status reported by the engine
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.raw.get("status").and_then(Value::as_str)
    }

    /// Run duration reported by the engine, in seconds
    #[must_use]
    pub fn duration_s(&self) -> Option<f64> {
        self.raw.get("duration_s").and_then(Value::as_f64)
    }

    /// Run-level error message, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.raw.get("error").and_then(Value::as_str)
    }

    /// Decode the `metrics` section. Returns `None` if it is missing or does
    /// not have the expected shape.
    #[must_use]
    pub fn metrics(&self) -> Option<RuntimeMetrics> {
        let metrics = self.raw.get("metrics")?;
        serde_json::from_value(metrics.clone()).ok()
    }

    /// Classified failures recorded during the run. Entries that do not
    /// decode are skipped.
    #[must_use]
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.records("failures")
    }

    /// Framework diagnostics recorded during the run (for example a failure
    /// classifier that raised). Entries that do not decode are skipped.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<FailureRecord> {
        self.records("diagnostics")
    }

    fn records(&self, key: &str) -> Vec<FailureRecord> {
        self.raw
            .get(key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Latency histogram summary for one step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyStats {
    /// Number of recorded invocations
    pub count: u64,
    /// Sum of durations in seconds
    pub total_s: f64,
    /// Fastest invocation in seconds
    pub min_s: f64,
    /// Slowest invocation in seconds
    pub max_s: f64,
}

impl LatencyStats {
    /// Record one invocation
    pub fn record(&mut self, duration_s: f64) {
        if self.count == 0 {
            self.min_s = duration_s;
            self.max_s = duration_s;
        } else {
            self.min_s = self.min_s.min(duration_s);
            self.max_s = self.max_s.max(duration_s);
        }
        self.count += 1;
        self.total_s += duration_s;
    }

    /// Mean duration in seconds
    #[must_use]
    pub fn mean_s(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_s / self.count as f64)
    }
}

/// Barrier counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierMetrics {
    /// Steps that waited on a barrier
    pub waits: u64,
    /// Barrier releases
    pub releases: u64,
    /// Timeouts
    pub timeouts: u64,
}

/// Map fan-out counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapMetrics {
    /// Map fan-outs started
    pub started: u64,
    /// Workers spawned
    pub workers: u64,
    /// Map fan-outs completed
    pub completed: u64,
}

/// Aggregate runtime metrics for a run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeMetrics {
    /// Per-step latency
    pub step_latency: BTreeMap<String, LatencyStats>,
    /// Barrier counters
    pub barriers: BarrierMetrics,
    /// Map counters
    pub maps: MapMetrics,
    /// Streamed tokens
    pub tokens: u64,
    /// Suspensions
    pub suspends: u64,
    /// Events seen, by canonical type
    pub event_counts: BTreeMap<String, u64>,
}

impl RuntimeMetrics {
    /// Derive the counters from the event log itself, for runs whose finish
    /// payload is missing (still running, or crashed before finishing).
    #[must_use]
    pub fn from_events(events: &[PipelineEvent]) -> Self {
        let mut metrics = Self::default();

        for event in events {
            *metrics
                .event_counts
                .entry(event.event_type.as_str().to_string())
                .or_default() += 1;

            match event.event_type {
                EventType::BarrierWait => metrics.barriers.waits += 1,
                EventType::BarrierRelease => metrics.barriers.releases += 1,
                EventType::Timeout => metrics.barriers.timeouts += 1,
                EventType::MapStart => metrics.maps.started += 1,
                EventType::MapWorker => metrics.maps.workers += 1,
                EventType::MapComplete => metrics.maps.completed += 1,
                EventType::Token => metrics.tokens += 1,
                EventType::Suspend => metrics.suspends += 1,
                _ => {}
            }

            if !event.is_step_scoped() {
                continue;
            }
            let duration_s = match event.payload() {
                EventPayload::StepEnd(p) => p.duration_s,
                EventPayload::StepError(p) => p.duration_s,
                _ => None,
            };
            if let (Some(name), Some(duration_s)) = (event.step_name.as_ref(), duration_s) {
                metrics
                    .step_latency
                    .entry(name.clone())
                    .or_default()
                    .record(duration_s);
            }
        }

        metrics
    }

    /// Count of events of the given type
    #[must_use]
    pub fn count(&self, event_type: EventType) -> u64 {
        self.event_counts
            .get(event_type.as_str())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{FailureKind, FailureReason, FailureSource};
    use serde_json::json;

    #[test]
    fn test_finish_payload_accessors() {
        let finish = FinishPayload::new(json!({
            "status": "failed",
            "duration_s": 1.25,
            "error": "step b failed",
        }));
        assert_eq!(finish.status(), Some("failed"));
        assert_eq!(finish.duration_s(), Some(1.25));
        assert_eq!(finish.error(), Some("step b failed"));
        assert!(finish.metrics().is_none());
    }

    #[test]
    fn test_metrics_decode_with_missing_sections() {
        let finish = FinishPayload::new(json!({
            "metrics": {
                "tokens": 7,
                "barriers": {"waits": 2},
                "step_latency": {"load": {"count": 1, "total_s": 0.5, "min_s": 0.5, "max_s": 0.5}},
                "something_new": true,
            }
        }));
        let metrics = finish.metrics().unwrap();

        assert_eq!(metrics.tokens, 7);
        assert_eq!(metrics.barriers.waits, 2);
        assert_eq!(metrics.barriers.releases, 0);
        assert_eq!(metrics.step_latency["load"].mean_s(), Some(0.5));
        assert!(metrics.event_counts.is_empty());
    }

    #[test]
    fn test_failures_and_diagnostics() {
        let finish = FinishPayload::new(json!({
            "status": "failed",
            "failures": [
                {"kind": "step", "source": "user_code", "reason": "step_error",
                 "error_message": "step failed", "step": "failing_step"},
                "not a record",
                {"kind": "step", "step": 42},
            ],
            "diagnostics": [
                {"kind": "infra", "source": "framework", "reason": "classifier_error",
                 "error": "TypeError: bad classifier", "step": "failing_step"},
            ],
        }));

        let failures = finish.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FailureKind::Step);
        assert!(failures[0].is_user_code());
        assert_eq!(failures[0].message(), Some("step failed"));

        let diagnostics = finish.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].reason, FailureReason::ClassifierError);
        assert_eq!(diagnostics[0].source, FailureSource::Framework);
    }

    #[test]
    fn test_no_failures_section() {
        let finish = FinishPayload::new(json!({"status": "success", "failures": null}));
        assert!(finish.failures().is_empty());
        assert!(finish.diagnostics().is_empty());
    }

    #[test]
    fn test_metrics_decode_wrong_shape() {
        let finish = FinishPayload::new(json!({"metrics": {"tokens": "many"}}));
        assert!(finish.metrics().is_none());
    }

    #[test]
    fn test_latency_stats_record() {
        let mut stats = LatencyStats::default();
        assert_eq!(stats.mean_s(), None);

        stats.record(2.0);
        stats.record(1.0);
        stats.record(3.0);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_s, 1.0);
        assert_eq!(stats.max_s, 3.0);
        assert_eq!(stats.mean_s(), Some(2.0));
    }

    #[test]
    fn test_metrics_from_events() {
        let t = "2024-01-01T00:00:00Z";
        let events = vec![
            PipelineEvent::new(1, EventType::Start, t).with_step("system"),
            PipelineEvent::new(2, EventType::StepStart, t).with_step("fan"),
            PipelineEvent::new(3, EventType::MapStart, t).with_step("fan"),
            PipelineEvent::new(4, EventType::MapWorker, t).with_step("work"),
            PipelineEvent::new(5, EventType::MapWorker, t).with_step("work"),
            PipelineEvent::new(6, EventType::MapComplete, t).with_step("fan"),
            PipelineEvent::new(7, EventType::Token, t).with_step("work"),
            PipelineEvent::new(8, EventType::BarrierWait, t).with_step("join"),
            PipelineEvent::new(9, EventType::BarrierRelease, t).with_step("join"),
            PipelineEvent::new(10, EventType::StepEnd, t)
                .with_step("fan")
                .with_data(json!({"duration_s": 0.5})),
            PipelineEvent::new(11, EventType::StepError, t)
                .with_step("fan")
                .with_data(json!({"duration_s": 1.5})),
        ];
        let metrics = RuntimeMetrics::from_events(&events);

        assert_eq!(metrics.maps, MapMetrics { started: 1, workers: 2, completed: 1 });
        assert_eq!(metrics.barriers.waits, 1);
        assert_eq!(metrics.barriers.releases, 1);
        assert_eq!(metrics.tokens, 1);
        assert_eq!(metrics.count(EventType::MapWorker), 2);
        assert_eq!(metrics.count(EventType::Suspend), 0);
        assert_eq!(metrics.step_latency["fan"].count, 2);
        assert_eq!(metrics.step_latency["fan"].total_s, 2.0);
    }
}

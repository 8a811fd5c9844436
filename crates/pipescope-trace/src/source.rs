//! Source - Interface to the data-fetching layer
//!
//! The trace engine never performs I/O. A `RunSource` supplies the run
//! record, its ordered event log and its timeline; implementations decide
//! where those come from.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::event::{PipelineEvent, Run, TimelineEntry};

/// Everything fetched for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunBundle {
    /// Run record
    pub run: Run,
    /// Event log, ordered by `seq`
    #[serde(default)]
    pub events: Vec<PipelineEvent>,
    /// Step timeline
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

impl RunBundle {
    /// Sort the event log by `seq`, for sources that do not guarantee order
    pub fn normalize(&mut self) {
        self.events.sort_by_key(|e| e.seq);
    }
}

/// Trait for run data providers
#[async_trait::async_trait]
pub trait RunSource: Send + Sync {
    /// Fetch the run record
    async fn fetch_run(&self, run_id: &str) -> Result<Run>;

    /// Fetch the run's events, ordered by `seq`
    async fn fetch_events(&self, run_id: &str) -> Result<Vec<PipelineEvent>>;

    /// Fetch the run's timeline
    async fn fetch_timeline(&self, run_id: &str) -> Result<Vec<TimelineEntry>>;

    /// Fetch all three at once
    async fn fetch_bundle(&self, run_id: &str) -> Result<RunBundle> {
        Ok(RunBundle {
            run: self.fetch_run(run_id).await?,
            events: self.fetch_events(run_id).await?,
            timeline: self.fetch_timeline(run_id).await?,
        })
    }

    /// Get the source name (for logging)
    fn name(&self) -> &str;
}

/// In-memory run source
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunSource {
    runs: Arc<RwLock<HashMap<String, RunBundle>>>,
}

impl InMemoryRunSource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a run
    pub async fn insert(&self, mut bundle: RunBundle) {
        bundle.normalize();
        self.runs
            .write()
            .await
            .insert(bundle.run.run_id.clone(), bundle);
    }

    async fn get(&self, run_id: &str) -> Result<RunBundle> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(run_id.to_string()))
    }
}

#[async_trait::async_trait]
impl RunSource for InMemoryRunSource {
    #[instrument(skip(self))]
    async fn fetch_run(&self, run_id: &str) -> Result<Run> {
        Ok(self.get(run_id).await?.run)
    }

    #[instrument(skip(self))]
    async fn fetch_events(&self, run_id: &str) -> Result<Vec<PipelineEvent>> {
        Ok(self.get(run_id).await?.events)
    }

    #[instrument(skip(self))]
    async fn fetch_timeline(&self, run_id: &str) -> Result<Vec<TimelineEntry>> {
        Ok(self.get(run_id).await?.timeline)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, RunStatus};

    fn bundle(run_id: &str) -> RunBundle {
        RunBundle {
            run: Run {
                run_id: run_id.to_string(),
                pipeline_hash: "abc123".to_string(),
                pipeline_name: "etl".to_string(),
                status: RunStatus::Success,
                start_time: "2024-01-01T00:00:00Z".to_string(),
                end_time: Some("2024-01-01T00:00:02Z".to_string()),
                duration_seconds: 2.0,
                run_meta: None,
            },
            events: vec![
                PipelineEvent::new(2, EventType::StepEnd, "2024-01-01T00:00:01Z").with_step("a"),
                PipelineEvent::new(1, EventType::StepStart, "2024-01-01T00:00:00Z").with_step("a"),
            ],
            timeline: vec![TimelineEntry::new(
                "a",
                "2024-01-01T00:00:00Z",
                "2024-01-01T00:00:01Z",
            )],
        }
    }

    #[tokio::test]
    async fn test_fetch_bundle() {
        let source = InMemoryRunSource::new();
        source.insert(bundle("run1")).await;

        let fetched = tokio_test::assert_ok!(source.fetch_bundle("run1").await);
        assert_eq!(fetched.run.pipeline_name, "etl");
        let seqs: Vec<i64> = fetched.events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(fetched.timeline.len(), 1);
        assert_eq!(source.name(), "memory");
    }

    #[tokio::test]
    async fn test_missing_run() {
        let source = InMemoryRunSource::new();
        let err = tokio_test::assert_err!(source.fetch_events("missing").await);
        assert!(matches!(err, Error::NotFound(ref id) if id == "missing"));
    }

    #[test]
    fn test_bundle_deserialization_defaults() {
        let json = r#"{
            "run": {
                "run_id": "r1",
                "pipeline_hash": "h",
                "pipeline_name": "p",
                "status": "running",
                "start_time": "2024-01-01T00:00:00Z"
            }
        }"#;
        let bundle: RunBundle = serde_json::from_str(json).unwrap();
        assert!(bundle.events.is_empty());
        assert!(bundle.timeline.is_empty());
        assert_eq!(bundle.run.status, RunStatus::Running);
        assert_eq!(bundle.run.duration_seconds, 0.0);
    }
}

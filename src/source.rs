//! File-backed run source
//!
//! Reads run bundles (`{ run, events, timeline }`) stored as
//! `<runs_dir>/<run_id>.json`.

use std::path::{Path, PathBuf};

use pipescope_trace::{Error, PipelineEvent, Result, Run, RunBundle, RunSource, TimelineEntry};
use tracing::{debug, instrument};

/// Run source over a directory of JSON bundles
#[derive(Debug, Clone)]
pub struct FileRunSource {
    runs_dir: PathBuf,
}

impl FileRunSource {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    /// Resolve a CLI argument that is either a run id or a path to a bundle
    /// file. Returns the source to read from and the run id.
    pub fn resolve(runs_dir: &str, run: &str) -> (Self, String) {
        let path = Path::new(run);
        if path.extension().is_some_and(|ext| ext == "json") {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let run_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            return (Self::new(dir), run_id);
        }
        (Self::new(runs_dir), run.to_string())
    }

    fn bundle_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.json"))
    }

    async fn read_bundle(&self, run_id: &str) -> Result<RunBundle> {
        let path = self.bundle_path(run_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(run_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut bundle: RunBundle = serde_json::from_str(&content)?;
        bundle.normalize();
        debug!(
            path = %path.display(),
            events = bundle.events.len(),
            timeline = bundle.timeline.len(),
            "Loaded run bundle"
        );
        Ok(bundle)
    }
}

#[async_trait::async_trait]
impl RunSource for FileRunSource {
    #[instrument(skip(self))]
    async fn fetch_run(&self, run_id: &str) -> Result<Run> {
        Ok(self.read_bundle(run_id).await?.run)
    }

    #[instrument(skip(self))]
    async fn fetch_events(&self, run_id: &str) -> Result<Vec<PipelineEvent>> {
        Ok(self.read_bundle(run_id).await?.events)
    }

    #[instrument(skip(self))]
    async fn fetch_timeline(&self, run_id: &str) -> Result<Vec<TimelineEntry>> {
        Ok(self.read_bundle(run_id).await?.timeline)
    }

    #[instrument(skip(self))]
    async fn fetch_bundle(&self, run_id: &str) -> Result<RunBundle> {
        self.read_bundle(run_id).await
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_run_id() {
        let (source, run_id) = FileRunSource::resolve("runs", "run-42");
        assert_eq!(run_id, "run-42");
        assert_eq!(source.bundle_path(&run_id), PathBuf::from("runs/run-42.json"));
    }

    #[test]
    fn test_resolve_bundle_path() {
        let (source, run_id) = FileRunSource::resolve("runs", "/tmp/traces/run-7.json");
        assert_eq!(run_id, "run-7");
        assert_eq!(
            source.bundle_path(&run_id),
            PathBuf::from("/tmp/traces/run-7.json")
        );

        let (source, run_id) = FileRunSource::resolve("runs", "local.json");
        assert_eq!(source.bundle_path(&run_id), PathBuf::from("./local.json"));
    }

    #[tokio::test]
    async fn test_missing_bundle_is_not_found() {
        let source = FileRunSource::new("/nonexistent-pipescope-dir");
        let err = source.fetch_bundle("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

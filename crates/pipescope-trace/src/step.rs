//! Step - Per-step records derived from the event log

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// No lifecycle event seen yet
    #[default]
    Unknown,
    /// Started, not yet finished
    Running,
    /// Finished successfully
    Success,
    /// Finished with an error
    Failed,
}

impl StepStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Check if the step has finished
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured record for one step, rebuilt whenever the event log changes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessedStep {
    /// Step name
    pub name: String,

    /// Node kind reported at start (step, map, switch, ...)
    pub kind: Option<String>,

    /// Timestamp of the latest start
    pub start_time: Option<String>,

    /// Timestamp of the latest end or error
    pub end_time: Option<String>,

    /// Duration reported by the engine, in milliseconds
    pub duration_ms: Option<f64>,

    /// Current status
    pub status: StepStatus,

    /// Error message of the latest failure
    pub error: Option<String>,

    /// Number of observed starts
    pub attempts: u32,

    /// Input of the latest start (`Some(Null)` for an explicit null input)
    pub input_payload: Option<Value>,

    /// Output of the latest successful end
    pub output_payload: Option<Value>,

    /// Metadata merged across events
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ProcessedStep {
    /// Create an empty record for a step
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the step has been retried
    #[must_use]
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

//! Event - Event, timeline and run schemas for pipeline traces
//!
//! Events form the immutable, append-only log of a run. They arrive with a
//! loosely structured `data` payload; [`EventPayload`] gives each lifecycle
//! event its own typed view so callers match on variants instead of probing
//! JSON keys.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Step name reserved for run-level lifecycle events
pub const SYSTEM_STEP: &str = "system";

/// Event types emitted by the pipeline engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    /// Run started
    Start,
    /// Step invocation started
    StepStart,
    /// Step invocation completed
    StepEnd,
    /// Step invocation failed
    StepError,
    /// Map fan-out started
    MapStart,
    /// Map worker spawned
    MapWorker,
    /// Map fan-out completed
    MapComplete,
    /// Step waiting on a barrier
    BarrierWait,
    /// Barrier released
    BarrierRelease,
    /// Streamed token
    Token,
    /// Run suspended
    Suspend,
    /// Timeout hit
    Timeout,
    /// Run cancelled
    Cancelled,
    /// Run finished; carries the finish payload
    Finish,
    /// Any type this version does not recognize
    Unknown,
}

impl EventType {
    /// Returns the canonical (lowercase) string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StepStart => "step_start",
            Self::StepEnd => "step_end",
            Self::StepError => "step_error",
            Self::MapStart => "map_start",
            Self::MapWorker => "map_worker",
            Self::MapComplete => "map_complete",
            Self::BarrierWait => "barrier_wait",
            Self::BarrierRelease => "barrier_release",
            Self::Token => "token",
            Self::Suspend => "suspend",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Finish => "finish",
            Self::Unknown => "unknown",
        }
    }

    /// Canonicalize a raw type string, mapping anything unrecognized to
    /// [`EventType::Unknown`]
    #[must_use]
    pub fn canonicalize(s: &str) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }

    /// Whether the event ends a step invocation
    #[must_use]
    pub fn is_step_terminal(&self) -> bool {
        matches!(self, Self::StepEnd | Self::StepError)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "step_start" => Ok(Self::StepStart),
            "step_end" => Ok(Self::StepEnd),
            "step_error" => Ok(Self::StepError),
            "map_start" => Ok(Self::MapStart),
            "map_worker" => Ok(Self::MapWorker),
            "map_complete" => Ok(Self::MapComplete),
            "barrier_wait" => Ok(Self::BarrierWait),
            "barrier_release" => Ok(Self::BarrierRelease),
            "token" => Ok(Self::Token),
            "suspend" => Ok(Self::Suspend),
            "timeout" => Ok(Self::Timeout),
            "cancelled" => Ok(Self::Cancelled),
            "finish" => Ok(Self::Finish),
            _ => Err(format!("unknown event type: {s}")),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::canonicalize(&raw))
    }
}

/// Parse an ISO-8601 timestamp. Timestamps without an offset are read as UTC.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// A single event in a run's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Sequence number, strictly increasing within a run
    pub seq: i64,

    /// Event type
    pub event_type: EventType,

    /// Step the event belongs to (None for run-level events)
    #[serde(default)]
    pub step_name: Option<String>,

    /// When the event was recorded (ISO-8601)
    pub timestamp: String,

    /// Event payload
    #[serde(default)]
    pub data: Option<Value>,
}

impl PipelineEvent {
    /// Create a new event
    #[must_use]
    pub fn new(seq: i64, event_type: EventType, timestamp: impl Into<String>) -> Self {
        Self {
            seq,
            event_type,
            step_name: None,
            timestamp: timestamp.into(),
            data: None,
        }
    }

    /// Set the step name
    #[must_use]
    pub fn with_step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    /// Set the payload
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether the event describes a step rather than the run itself
    #[must_use]
    pub fn is_step_scoped(&self) -> bool {
        self.step_name
            .as_deref()
            .is_some_and(|name| name != SYSTEM_STEP)
    }

    /// Parsed timestamp, if well-formed
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Typed view of the payload
    #[must_use]
    pub fn payload(&self) -> EventPayload<'_> {
        EventPayload::from_event(self)
    }

    fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.as_object()?.get(key)
    }
}

/// Payload of a `step_start` event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepStartPayload<'a> {
    /// Step input; `Some(Value::Null)` is a null input, `None` is no input key
    pub input: Option<&'a Value>,
    /// Node kind reported by the engine
    pub kind: Option<&'a str>,
}

/// Payload of a `step_end` event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepEndPayload<'a> {
    /// Step output
    pub output: Option<&'a Value>,
    /// Duration in seconds
    pub duration_s: Option<f64>,
    /// Metadata to merge into the step
    pub meta: Option<&'a Map<String, Value>>,
}

/// Payload of a `step_error` event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepErrorPayload {
    /// Error message (`error` key, else `message`)
    pub error: Option<String>,
    /// Duration in seconds
    pub duration_s: Option<f64>,
}

/// Typed view over an event's payload, keyed by event type
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload<'a> {
    /// `step_start`
    StepStart(StepStartPayload<'a>),
    /// `step_end`
    StepEnd(StepEndPayload<'a>),
    /// `step_error`
    StepError(StepErrorPayload),
    /// `finish`, with the unwrapped summary if the event carries data
    Finish(Option<&'a Value>),
    /// `token`, with the streamed value
    Token(Option<&'a Value>),
    /// Any other event; the payload is not interpreted
    Other(EventType),
}

impl<'a> EventPayload<'a> {
    /// Build the typed view. Missing or wrongly typed keys read as absent.
    #[must_use]
    pub fn from_event(event: &'a PipelineEvent) -> Self {
        match event.event_type {
            EventType::StepStart => Self::StepStart(StepStartPayload {
                input: event.field("input"),
                kind: event.field("kind").and_then(Value::as_str),
            }),
            EventType::StepEnd => Self::StepEnd(StepEndPayload {
                output: event.field("output"),
                duration_s: event.field("duration_s").and_then(Value::as_f64),
                meta: event.field("meta").and_then(Value::as_object),
            }),
            EventType::StepError => Self::StepError(StepErrorPayload {
                error: error_text(event.field("error"))
                    .or_else(|| error_text(event.field("message"))),
                duration_s: event.field("duration_s").and_then(Value::as_f64),
            }),
            EventType::Finish => Self::Finish(
                event
                    .data
                    .as_ref()
                    .filter(|data| !data.is_null())
                    .map(|data| match data.get("payload") {
                        Some(nested) if !nested.is_null() => nested,
                        _ => data,
                    }),
            ),
            EventType::Token => Self::Token(event.data.as_ref()),
            other => Self::Other(other),
        }
    }
}

fn error_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is still executing
    Running,
    /// Run completed successfully
    Success,
    /// Run failed
    Failed,
    /// Run hit its timeout
    Timeout,
    /// Run was cancelled
    Cancelled,
    /// Status not recognized
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Check if the run has finished
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running | Self::Unknown)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run record as supplied by the data-fetching layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier
    pub run_id: String,
    /// Hash of the pipeline definition
    pub pipeline_hash: String,
    /// Pipeline name
    pub pipeline_name: String,
    /// Current status
    pub status: RunStatus,
    /// When the run started (ISO-8601)
    pub start_time: String,
    /// When the run ended (ISO-8601)
    #[serde(default)]
    pub end_time: Option<String>,
    /// Wall-clock duration in seconds
    #[serde(default)]
    pub duration_seconds: f64,
    /// Free-form run metadata
    #[serde(default)]
    pub run_meta: Option<Value>,
}

/// One step invocation that actually started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Step name
    pub step_name: String,
    /// Invocation start (ISO-8601)
    pub start_time: String,
    /// Invocation end (ISO-8601)
    pub end_time: String,
}

impl TimelineEntry {
    /// Create a new timeline entry
    #[must_use]
    pub fn new(
        step_name: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }

    /// Interval in milliseconds since the epoch. A negative interval is
    /// collapsed to zero length at its start.
    #[must_use]
    pub fn interval_ms(&self) -> Option<(i64, i64)> {
        let start = parse_timestamp(&self.start_time)?.timestamp_millis();
        let end = parse_timestamp(&self.end_time)?.timestamp_millis();
        Some((start, end.max(start)))
    }
}

//! Failure - Classified failures and runtime diagnostics from a finished run
//!
//! The engine records every failure it observes in the finish payload with
//! a kind, a source and a reason. Framework problems hit while classifying
//! (a classifier that raised, or returned garbage) go to a separate
//! `diagnostics` list with the same shape. Values this version does not know
//! read as `Unknown` rather than failing the decode.

use serde::{Deserialize, Serialize};

/// Which part of the run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A step raised
    Step,
    /// The runtime itself failed
    Infra,
    /// The pipeline definition was rejected
    Validation,
    /// Not recognized
    #[default]
    #[serde(other)]
    Unknown,
}

impl FailureKind {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Infra => "infra",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }
}

/// Who is to blame for a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSource {
    /// The pipeline author's code
    UserCode,
    /// The pipeline engine
    Framework,
    /// A third-party service or library (HTTP clients, databases, LLM APIs)
    ExternalDep,
    /// Not recognized
    #[default]
    #[serde(other)]
    Unknown,
}

impl FailureSource {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCode => "user_code",
            Self::Framework => "framework",
            Self::ExternalDep => "external_dep",
            Self::Unknown => "unknown",
        }
    }
}

/// Why a failure was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// A step raised an error
    StepError,
    /// The engine hit an internal error
    InternalError,
    /// Pipeline validation failed
    ValidationError,
    /// The failure classifier itself failed
    ClassifierError,
    /// Not recognized
    #[default]
    #[serde(other)]
    Unknown,
}

impl FailureReason {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StepError => "step_error",
            Self::InternalError => "internal_error",
            Self::ValidationError => "validation_error",
            Self::ClassifierError => "classifier_error",
            Self::Unknown => "unknown",
        }
    }
}

/// One classified failure or diagnostic
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureRecord {
    /// Failure kind
    pub kind: FailureKind,
    /// Failure source
    pub source: FailureSource,
    /// Failure reason
    pub reason: FailureReason,
    /// Step the failure belongs to, if any
    pub step: Option<String>,
    /// Human-readable message (failures)
    pub error_message: Option<String>,
    /// Rendered error (diagnostics, and failures that carry the raw error)
    pub error: Option<String>,
}

impl FailureRecord {
    /// Best available message
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.error_message.as_deref().or(self.error.as_deref())
    }

    /// Whether the failure is blamed on the pipeline author's code
    #[must_use]
    pub fn is_user_code(&self) -> bool {
        self.source == FailureSource::UserCode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_failure() {
        let record: FailureRecord = serde_json::from_value(json!({
            "kind": "step",
            "source": "external_dep",
            "reason": "step_error",
            "error_message": "connection refused",
            "step": "call_api",
        }))
        .unwrap();

        assert_eq!(record.kind, FailureKind::Step);
        assert_eq!(record.source, FailureSource::ExternalDep);
        assert_eq!(record.reason, FailureReason::StepError);
        assert_eq!(record.step.as_deref(), Some("call_api"));
        assert_eq!(record.message(), Some("connection refused"));
        assert!(!record.is_user_code());
    }

    #[test]
    fn test_decode_diagnostic_and_unknown_values() {
        let record: FailureRecord = serde_json::from_value(json!({
            "kind": "infra",
            "source": "framework",
            "reason": "classifier_error",
            "error": "RuntimeError: classifier broke",
        }))
        .unwrap();
        assert_eq!(record.reason, FailureReason::ClassifierError);
        assert_eq!(record.message(), Some("RuntimeError: classifier broke"));
        assert_eq!(record.step, None);

        let record: FailureRecord =
            serde_json::from_value(json!({"kind": "cosmic_ray", "extra": 1})).unwrap();
        assert_eq!(record.kind, FailureKind::Unknown);
        assert_eq!(record.source, FailureSource::Unknown);
        assert_eq!(record.reason, FailureReason::Unknown);
        assert_eq!(record.message(), None);
    }

    #[test]
    fn test_as_str_matches_wire_names() {
        for kind in [FailureKind::Step, FailureKind::Infra, FailureKind::Validation] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
        assert_eq!(FailureSource::ExternalDep.as_str(), "external_dep");
        assert_eq!(FailureReason::ValidationError.as_str(), "validation_error");
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhaseflowError {
    #[error("not initialized: no .phaseflow/config.yaml found")]
    NotInitialized,

    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("illegal transition from {from} to {to}: {reason}")]
    IllegalTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("phase '{phase}' has incomplete deliverables: {}", missing.join(", "))]
    IncompleteDeliverables { phase: String, missing: Vec<String> },

    #[error("unknown deliverable '{deliverable}' for phase '{phase}'")]
    UnknownDeliverable { phase: String, deliverable: String },

    #[error("no transformer registered for {from} -> {to}")]
    NoTransformer { from: String, to: String },

    #[error("analyzer failed for '{deliverable}': {reason}")]
    Analyzer { deliverable: String, reason: String },

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("{subject} failed schema validation: {}", issues.join("; "))]
    Schema {
        subject: &'static str,
        issues: Vec<String>,
    },

    #[error("timeout exceeded: no attempt finished within {timeout_ms}ms ({attempts} attempts)")]
    TimeoutExceeded { attempts: u32, timeout_ms: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("state document '{key}' is malformed: {reason}")]
    MalformedState { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PhaseflowError>;

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Coarse category of a failure, carried on failed transition results so
/// callers can branch without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Analysis,
    Transform,
    Schema,
    Timeout,
    Context,
    Persistence,
    Config,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Analysis => "analysis",
            FailureKind::Transform => "transform",
            FailureKind::Schema => "schema",
            FailureKind::Timeout => "timeout",
            FailureKind::Context => "context",
            FailureKind::Persistence => "persistence",
            FailureKind::Config => "config",
        }
    }

    /// Validation failures are deterministic; everything else may succeed on
    /// a later run.
    pub fn is_transient(self) -> bool {
        !matches!(self, FailureKind::Validation | FailureKind::Config)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PhaseflowError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PhaseflowError::UnknownPhase(_)
            | PhaseflowError::IllegalTransition { .. }
            | PhaseflowError::IncompleteDeliverables { .. }
            | PhaseflowError::UnknownDeliverable { .. }
            | PhaseflowError::NoTransformer { .. } => FailureKind::Validation,
            PhaseflowError::Analyzer { .. } => FailureKind::Analysis,
            PhaseflowError::Transform(_) => FailureKind::Transform,
            PhaseflowError::Schema { subject, .. } if *subject == "enhanced context" => {
                FailureKind::Context
            }
            PhaseflowError::Schema { .. } => FailureKind::Schema,
            PhaseflowError::TimeoutExceeded { .. } => FailureKind::Timeout,
            PhaseflowError::NotInitialized | PhaseflowError::InvalidConfig(_) => {
                FailureKind::Config
            }
            PhaseflowError::MalformedState { .. }
            | PhaseflowError::Io(_)
            | PhaseflowError::Yaml(_)
            | PhaseflowError::Json(_) => FailureKind::Persistence,
        }
    }

    /// Short machine-friendly tag used as the prefix of failure messages.
    pub fn code(&self) -> &'static str {
        match self {
            PhaseflowError::NotInitialized => "NotInitialized",
            PhaseflowError::UnknownPhase(_) => "UnknownPhase",
            PhaseflowError::IllegalTransition { .. } => "IllegalTransition",
            PhaseflowError::IncompleteDeliverables { .. } => "IncompleteDeliverables",
            PhaseflowError::UnknownDeliverable { .. } => "UnknownDeliverable",
            PhaseflowError::NoTransformer { .. } => "NoTransformer",
            PhaseflowError::Analyzer { .. } => "AnalyzerFailed",
            PhaseflowError::Transform(_) => "TransformFailed",
            PhaseflowError::Schema { .. } => "SchemaViolation",
            PhaseflowError::TimeoutExceeded { .. } => "TimeoutExceeded",
            PhaseflowError::InvalidConfig(_) => "InvalidConfig",
            PhaseflowError::MalformedState { .. } => "MalformedState",
            PhaseflowError::Io(_) => "Io",
            PhaseflowError::Yaml(_) => "Yaml",
            PhaseflowError::Json(_) => "Json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_deliverables_lists_names() {
        let err = PhaseflowError::IncompleteDeliverables {
            phase: "concept".to_string(),
            missing: vec!["user_personas".to_string(), "market_analysis".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("user_personas"));
        assert!(msg.contains("market_analysis"));
        assert_eq!(err.kind(), FailureKind::Validation);
    }

    #[test]
    fn schema_errors_split_by_subject() {
        let transform = PhaseflowError::Schema {
            subject: "transformation output",
            issues: vec!["missing required field `transformedAt`".to_string()],
        };
        assert_eq!(transform.kind(), FailureKind::Schema);
        assert!(transform.to_string().contains("transformedAt"));

        let context = PhaseflowError::Schema {
            subject: "enhanced context",
            issues: vec!["focusAreas is empty".to_string()],
        };
        assert_eq!(context.kind(), FailureKind::Context);
    }

    #[test]
    fn timeout_is_tagged_distinctly() {
        let err = PhaseflowError::TimeoutExceeded {
            attempts: 3,
            timeout_ms: 500,
        };
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(err.code(), "TimeoutExceeded");
        assert!(err.kind().is_transient());
        assert!(!FailureKind::Validation.is_transient());
    }
}

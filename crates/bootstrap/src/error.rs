//! Error types for the startup sequence.

use beacon_core::Phase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StartupError>;

/// Startup failure taxonomy. Every variant is fatal to the boot attempt;
/// the distinctions exist so logs and probe payloads can say precisely
/// which stage gave up and why.
#[derive(Error, Debug)]
pub enum StartupError {
    /// A phase step returned an error.
    #[error("{step} initialization failed during {phase} phase: {reason}")]
    StepFailed {
        phase: Phase,
        step: &'static str,
        reason: String,
    },

    /// A phase step exceeded the bounded wait for its environment tier.
    #[error("{step} initialization timed out during {phase} phase after {elapsed_ms}ms")]
    StepTimeout {
        phase: Phase,
        step: &'static str,
        elapsed_ms: u64,
    },

    /// Post-phase validation found critical handles unregistered.
    #[error("critical services failed to initialize after {phase} phase: {}", missing.join(", "))]
    ServicesMissing {
        phase: Phase,
        missing: Vec<&'static str>,
    },

    /// Environment or credential validation failed before any service
    /// initializer ran.
    #[error("configuration rejected: {0}")]
    Configuration(String),

    /// A finalize audit reported more failing components than the active
    /// policy tolerates.
    #[error("{audit} rejected startup during {phase} phase: {failures} component(s) failing")]
    AuditRejected {
        phase: Phase,
        audit: &'static str,
        failures: usize,
    },

    /// A phase was entered out of the fixed order.
    #[error("phase order violation: expected {expected}, attempted {attempted}")]
    SequenceViolation {
        expected: String,
        attempted: Phase,
    },

    /// The completion gate was asked to mark readiness before every phase
    /// finished cleanly.
    #[error("startup sequence incomplete: {completed}/{total} phases completed, {failed} failed")]
    SequenceIncomplete {
        completed: usize,
        failed: usize,
        total: usize,
    },
}

impl StartupError {
    /// Wrap a step error, flattening its full cause chain into the reason.
    pub fn step_failed(phase: Phase, step: &'static str, source: &anyhow::Error) -> Self {
        Self::StepFailed {
            phase,
            step,
            reason: format!("{source:#}"),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// The phase this error is attributable to, when one is known.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::StepFailed { phase, .. }
            | Self::StepTimeout { phase, .. }
            | Self::ServicesMissing { phase, .. }
            | Self::AuditRejected { phase, .. } => Some(*phase),
            Self::SequenceViolation { attempted, .. } => Some(*attempted),
            Self::Configuration(_) | Self::SequenceIncomplete { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StepTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_flattens_cause_chain() {
        let root = anyhow::anyhow!("connection refused");
        let wrapped = root.context("handshake with message bridge");
        let err = StartupError::step_failed(Phase::Dependencies, "bridge", &wrapped);
        let text = err.to_string();
        assert!(text.contains("bridge initialization failed"));
        assert!(text.contains("handshake with message bridge"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_services_missing_names_every_service() {
        let err = StartupError::ServicesMissing {
            phase: Phase::Services,
            missing: vec!["key_manager", "workers"],
        };
        let text = err.to_string();
        assert!(text.contains("key_manager, workers"));
        assert!(text.contains("services phase"));
    }

    #[test]
    fn test_phase_attribution() {
        let err = StartupError::StepTimeout {
            phase: Phase::Database,
            step: "store",
            elapsed_ms: 25_000,
        };
        assert_eq!(err.phase(), Some(Phase::Database));
        assert!(err.is_timeout());

        let err = StartupError::configuration("BEACON_ENV unset");
        assert_eq!(err.phase(), None);
        assert!(!err.is_timeout());
    }
}

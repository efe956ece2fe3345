//! Audit failure tolerance.

use beacon_core::Environment;

/// Failing components tolerated under the permissive policy.
pub const PERMISSIVE_FAILURE_THRESHOLD: usize = 2;

/// How the finalize audits treat failing components.
///
/// Resolved once at boot from the environment and the operator override
/// flag, then handed to both audits so they cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPolicy {
    /// Any failing component aborts startup.
    Strict,
    /// Up to `threshold` failing components are logged and tolerated.
    Permissive { threshold: usize },
    /// Operator override: audit findings are logged, never fatal.
    Bypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditVerdict {
    /// Nothing failing.
    Pass,
    /// Failures present but within tolerance; startup continues.
    Tolerated,
    /// Failures exceed tolerance; startup must abort.
    Reject,
}

impl AuditPolicy {
    pub fn resolve(environment: Environment, override_flag: bool) -> Self {
        if override_flag {
            return Self::Bypass;
        }
        match environment {
            Environment::Development | Environment::Test => Self::Permissive {
                threshold: PERMISSIVE_FAILURE_THRESHOLD,
            },
            Environment::Production | Environment::Staging => Self::Strict,
        }
    }

    pub fn evaluate(&self, failures: usize) -> AuditVerdict {
        if failures == 0 {
            return AuditVerdict::Pass;
        }
        match self {
            Self::Bypass => AuditVerdict::Tolerated,
            Self::Permissive { threshold } if failures <= *threshold => AuditVerdict::Tolerated,
            _ => AuditVerdict::Reject,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive { .. } => "permissive",
            Self::Bypass => "bypass",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_by_environment() {
        assert_eq!(
            AuditPolicy::resolve(Environment::Production, false),
            AuditPolicy::Strict
        );
        assert_eq!(
            AuditPolicy::resolve(Environment::Staging, false),
            AuditPolicy::Strict
        );
        assert_eq!(
            AuditPolicy::resolve(Environment::Development, false),
            AuditPolicy::Permissive {
                threshold: PERMISSIVE_FAILURE_THRESHOLD
            }
        );
        assert_eq!(
            AuditPolicy::resolve(Environment::Test, false),
            AuditPolicy::Permissive {
                threshold: PERMISSIVE_FAILURE_THRESHOLD
            }
        );
    }

    #[test]
    fn test_override_flag_wins_everywhere() {
        for environment in [
            Environment::Production,
            Environment::Staging,
            Environment::Development,
            Environment::Test,
        ] {
            assert_eq!(
                AuditPolicy::resolve(environment, true),
                AuditPolicy::Bypass
            );
        }
    }

    #[test]
    fn test_strict_rejects_any_failure() {
        assert_eq!(AuditPolicy::Strict.evaluate(0), AuditVerdict::Pass);
        assert_eq!(AuditPolicy::Strict.evaluate(1), AuditVerdict::Reject);
    }

    #[test]
    fn test_permissive_threshold_boundary() {
        let policy = AuditPolicy::Permissive { threshold: 2 };
        assert_eq!(policy.evaluate(0), AuditVerdict::Pass);
        assert_eq!(policy.evaluate(1), AuditVerdict::Tolerated);
        assert_eq!(policy.evaluate(2), AuditVerdict::Tolerated);
        assert_eq!(policy.evaluate(3), AuditVerdict::Reject);
    }

    #[test]
    fn test_bypass_never_rejects() {
        assert_eq!(AuditPolicy::Bypass.evaluate(0), AuditVerdict::Pass);
        assert_eq!(AuditPolicy::Bypass.evaluate(10), AuditVerdict::Tolerated);
    }
}

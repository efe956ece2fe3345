//! Per-phase timeout tiers.

use std::time::Duration;

use beacon_core::{Environment, Phase};

/// Upper bound applied to every step of a given phase.
///
/// Each environment tier gets one table so the bounds sit in a single
/// place instead of being scattered across call sites. Production and
/// staging share the generous remote-backend tier; development assumes
/// local services; test keeps everything short enough for CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub init: Duration,
    pub dependencies: Duration,
    pub database: Duration,
    pub cache: Duration,
    pub services: Duration,
    pub realtime: Duration,
    pub finalize: Duration,
}

impl TimeoutConfig {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production | Environment::Staging => Self {
                init: Duration::from_secs(5),
                dependencies: Duration::from_secs(30),
                database: Duration::from_secs(25),
                cache: Duration::from_secs(15),
                services: Duration::from_secs(30),
                realtime: Duration::from_secs(15),
                finalize: Duration::from_secs(20),
            },
            Environment::Development => Self {
                init: Duration::from_secs(5),
                dependencies: Duration::from_secs(10),
                database: Duration::from_secs(10),
                cache: Duration::from_secs(5),
                services: Duration::from_secs(10),
                realtime: Duration::from_secs(5),
                finalize: Duration::from_secs(10),
            },
            Environment::Test => Self::uniform(Duration::from_secs(2)),
        }
    }

    /// Same bound for every phase. Used by the test tier and by harnesses
    /// that want deterministic short waits.
    pub fn uniform(bound: Duration) -> Self {
        Self {
            init: bound,
            dependencies: bound,
            database: bound,
            cache: bound,
            services: bound,
            realtime: bound,
            finalize: bound,
        }
    }

    pub fn bound(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Init => self.init,
            Phase::Dependencies => self.dependencies,
            Phase::Database => self.database,
            Phase::Cache => self.cache,
            Phase::Services => self.services,
            Phase::Realtime => self.realtime,
            Phase::Finalize => self.finalize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_database_bound() {
        let timeouts = TimeoutConfig::for_environment(Environment::Production);
        assert_eq!(timeouts.bound(Phase::Database), Duration::from_secs(25));
        assert_eq!(
            timeouts,
            TimeoutConfig::for_environment(Environment::Staging)
        );
    }

    #[test]
    fn test_test_tier_is_uniformly_short() {
        let timeouts = TimeoutConfig::for_environment(Environment::Test);
        for phase in Phase::ALL {
            assert_eq!(timeouts.bound(phase), Duration::from_secs(2));
        }
    }

    #[test]
    fn test_development_is_tighter_than_production() {
        let dev = TimeoutConfig::for_environment(Environment::Development);
        let prod = TimeoutConfig::for_environment(Environment::Production);
        for phase in Phase::ALL {
            assert!(dev.bound(phase) <= prod.bound(phase));
        }
    }
}

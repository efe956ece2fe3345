use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One stage of the startup sequence.
///
/// The declaration order is the execution order. Phases are never
/// reordered or skipped: `Phase::ALL` is the authoritative sequence and
/// the derived `Ord` follows it.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Dependencies,
    Database,
    Cache,
    Services,
    Realtime,
    Finalize,
}

impl Phase {
    /// The fixed startup order.
    pub const ALL: [Phase; 7] = [
        Phase::Init,
        Phase::Dependencies,
        Phase::Database,
        Phase::Cache,
        Phase::Services,
        Phase::Realtime,
        Phase::Finalize,
    ];

    /// Number of phases in the sequence.
    pub const COUNT: usize = Self::ALL.len();

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Dependencies => "dependencies",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::Services => "services",
            Self::Realtime => "realtime",
            Self::Finalize => "finalize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Self::Init),
            "dependencies" => Some(Self::Dependencies),
            "database" => Some(Self::Database),
            "cache" => Some(Self::Cache),
            "services" => Some(Self::Services),
            "realtime" => Some(Self::Realtime),
            "finalize" => Some(Self::Finalize),
            _ => None,
        }
    }

    /// Zero-based position in the startup order.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    /// The phase that follows this one, if any.
    pub fn next(&self) -> Option<Phase> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_last(&self) -> bool {
        *self == Phase::Finalize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_is_fixed() {
        assert_eq!(Phase::ALL[0], Phase::Init);
        assert_eq!(Phase::ALL[6], Phase::Finalize);
        assert_eq!(Phase::COUNT, 7);

        // Ord agrees with the declared sequence.
        for pair in Phase::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_phase_next_chain() {
        assert_eq!(Phase::Init.next(), Some(Phase::Dependencies));
        assert_eq!(Phase::Database.next(), Some(Phase::Cache));
        assert_eq!(Phase::Realtime.next(), Some(Phase::Finalize));
        assert_eq!(Phase::Finalize.next(), None);
        assert!(Phase::Finalize.is_last());
    }

    #[test]
    fn test_phase_index() {
        assert_eq!(Phase::Init.index(), 0);
        assert_eq!(Phase::Database.index(), 2);
        assert_eq!(Phase::Finalize.index(), 6);
    }

    #[test]
    fn test_phase_serialization() {
        assert_eq!(Phase::Database.as_str(), "database");
        assert_eq!(Phase::Realtime.as_str(), "realtime");

        let json = serde_json::to_string(&Phase::Dependencies).unwrap();
        assert_eq!(json, "\"dependencies\"");
    }

    #[test]
    fn test_phase_parsing() {
        assert_eq!(Phase::parse("cache"), Some(Phase::Cache));
        assert_eq!(Phase::parse("finalize"), Some(Phase::Finalize));
        assert_eq!(Phase::parse("warmup"), None);
    }
}

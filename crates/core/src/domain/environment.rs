use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

/// Deployment environment the process was started for.
///
/// The environment is a plain input: it is parsed once at process start
/// (CLI flag or `BEACON_ENV`) and passed explicitly to everything that
/// needs it. Timeout tiers and audit policy are derived from it in the
/// bootstrap crate; this type carries no policy itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Development,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
            Self::Test => "test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "production" | "prod" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" | "dev" => Some(Self::Development),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::UnknownEnvironment(s.to_string()))
    }
}

/// How the process is being driven.
///
/// `Service` is a real deployment; `Harness` is an embedding test driver.
/// The mode is always passed in explicitly, never sniffed from the
/// process environment. The only behavioral difference is failure
/// teardown: a service tears down already-registered handles before it
/// exits, a harness leaves shared state intact for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    #[default]
    Service,
    Harness,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Harness => "harness",
        }
    }
}

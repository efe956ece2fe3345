//! Server configuration from the process environment.

use std::str::FromStr;

use anyhow::Context;
use beacon_core::Environment;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4600;
const DEFAULT_DATABASE_URL: &str = "sqlite:beacon.db";
const DEFAULT_WORKER_COUNT: usize = 4;

/// Everything the platform reads from `BEACON_*` variables, resolved once
/// at boot. Optional URLs that are unset or empty stay `None`; the
/// startup catalog decides what that means per service.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Secondary analytics store; optional everywhere.
    pub analytics_url: Option<String>,
    /// External message bridge; required in production and staging.
    pub bridge_url: Option<String>,
    /// Required external collaborators probed during the dependencies
    /// phase, comma-separated in `BEACON_PROBE_URLS`.
    pub dependency_probes: Vec<String>,
    pub secret: Option<String>,
    pub worker_count: usize,
    pub metrics_enabled: bool,
    /// Operator override: finalize audits warn instead of aborting.
    pub bypass_audits: bool,
}

impl PlatformConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Tests inject closures
    /// here instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let environment = match non_empty(lookup("BEACON_ENV")) {
            Some(raw) => Environment::from_str(&raw)?,
            None => Environment::default(),
        };
        let port = match non_empty(lookup("BEACON_PORT")) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid BEACON_PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };
        let worker_count = match non_empty(lookup("BEACON_WORKERS")) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid BEACON_WORKERS: {raw}"))?,
            None => DEFAULT_WORKER_COUNT,
        };

        Ok(Self {
            environment,
            host: non_empty(lookup("BEACON_HOST")).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_url: non_empty(lookup("BEACON_DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            analytics_url: non_empty(lookup("BEACON_ANALYTICS_URL")),
            bridge_url: non_empty(lookup("BEACON_BRIDGE_URL")),
            dependency_probes: non_empty(lookup("BEACON_PROBE_URLS"))
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|url| !url.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            secret: non_empty(lookup("BEACON_SECRET")),
            worker_count,
            metrics_enabled: flag(lookup("BEACON_METRICS")),
            bypass_audits: flag(lookup("BEACON_BYPASS_AUDITS")),
        })
    }

    /// Defaults for a given environment with no variables set. Harnesses
    /// and tests start from this and override fields directly.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            analytics_url: None,
            bridge_url: None,
            dependency_probes: Vec::new(),
            secret: None,
            worker_count: DEFAULT_WORKER_COUNT,
            metrics_enabled: false,
            bypass_audits: false,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("1") | Some("true") | Some("yes")
    )
}

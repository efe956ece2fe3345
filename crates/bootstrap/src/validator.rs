//! Post-phase critical service validation.

use beacon_core::Phase;
use tracing::{debug, warn};

use crate::catalog::SharedHandle;
use crate::context::ServiceRegistry;
use crate::error::{Result, StartupError};

/// Services whose absence after their owning phase is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalService {
    Store,
    Cache,
    Bridge,
    KeyManager,
    ToolRegistry,
    Workers,
    Realtime,
}

impl CriticalService {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Cache => "cache",
            Self::Bridge => "bridge",
            Self::KeyManager => "key_manager",
            Self::ToolRegistry => "tool_registry",
            Self::Workers => "workers",
            Self::Realtime => "realtime",
        }
    }

    /// The registry slot this service lives in.
    fn lookup<'r>(&self, services: &'r ServiceRegistry) -> Option<&'r SharedHandle> {
        match self {
            Self::Store => services.store.as_ref(),
            Self::Cache => services.cache.as_ref(),
            Self::Bridge => services.bridge.as_ref(),
            Self::KeyManager => services.key_manager.as_ref(),
            Self::ToolRegistry => services.tool_registry.as_ref(),
            Self::Workers => services.workers.as_ref(),
            Self::Realtime => services.realtime.as_ref(),
        }
    }
}

impl std::fmt::Display for CriticalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Critical services each phase must have registered before it may
/// complete. Phases with an empty set pass validation trivially.
pub fn critical_services(phase: Phase) -> &'static [CriticalService] {
    match phase {
        Phase::Init => &[],
        Phase::Dependencies => &[CriticalService::Bridge],
        Phase::Database => &[CriticalService::Store],
        Phase::Cache => &[CriticalService::Cache],
        Phase::Services => &[
            CriticalService::KeyManager,
            CriticalService::ToolRegistry,
            CriticalService::Workers,
        ],
        Phase::Realtime => &[CriticalService::Realtime],
        Phase::Finalize => &[],
    }
}

/// Check every critical service declared for `phase` and name all of the
/// missing ones in one error, so a multi-service outage reads as one
/// diagnosis instead of a fix-rerun-fix loop.
pub fn validate(phase: Phase, services: &ServiceRegistry) -> Result<()> {
    let declared = critical_services(phase);
    if declared.is_empty() {
        return Ok(());
    }

    let missing: Vec<&'static str> = declared
        .iter()
        .filter(|service| service.lookup(services).is_none())
        .map(CriticalService::as_str)
        .collect();

    if missing.is_empty() {
        debug!(phase = %phase, services = declared.len(), "critical services validated");
        Ok(())
    } else {
        warn!(phase = %phase, missing = ?missing, "critical service validation failed");
        Err(StartupError::ServicesMissing { phase, missing })
    }
}

//! Shared startup context.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use beacon_core::Environment;
use events::EventBus;

use crate::catalog::SharedHandle;
use crate::readiness::{ReadinessState, StartupReport};

/// Typed record of every service handle startup can produce.
///
/// One named slot per service; a handle is either present or `None`.
/// Phase validation and the finalize audits read these slots by name, so
/// a service that moves phases changes exactly one table, not a string
/// key scattered through the tree.
#[derive(Default)]
pub struct ServiceRegistry {
    pub store: Option<SharedHandle>,
    pub cache: Option<SharedHandle>,
    pub bridge: Option<SharedHandle>,
    pub key_manager: Option<SharedHandle>,
    pub tool_registry: Option<SharedHandle>,
    pub workers: Option<SharedHandle>,
    pub realtime: Option<SharedHandle>,
    // Optional services. Absence is logged during startup, never fatal.
    pub analytics: Option<SharedHandle>,
    pub metrics: Option<SharedHandle>,
}

impl ServiceRegistry {
    /// Every handle currently registered, critical and optional alike.
    pub fn registered(&self) -> Vec<SharedHandle> {
        [
            &self.store,
            &self.cache,
            &self.bridge,
            &self.key_manager,
            &self.tool_registry,
            &self.workers,
            &self.realtime,
            &self.analytics,
            &self.metrics,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }

    pub fn registered_count(&self) -> usize {
        self.registered().len()
    }

    /// Drop every handle. Used on startup failure in service mode so
    /// partially initialized subsystems release their resources.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self
            .registered()
            .iter()
            .map(|handle| handle.service_name())
            .collect();
        f.debug_struct("ServiceRegistry")
            .field("registered", &names)
            .finish()
    }
}

/// Everything the startup sequence shares with the rest of the process:
/// the environment it booted in, the event bus, the service handles and
/// the readiness flags the probes serve.
///
/// Built once in `main`, wrapped in an `Arc`, and handed to the
/// sequencer and the HTTP layer alike.
pub struct StartupContext {
    environment: Environment,
    events: EventBus,
    services: RwLock<ServiceRegistry>,
    readiness: ReadinessState,
    report: RwLock<Option<StartupReport>>,
}

impl StartupContext {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            events: EventBus::new(),
            services: RwLock::new(ServiceRegistry::default()),
            readiness: ReadinessState::new(),
            report: RwLock::new(None),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn readiness(&self) -> &ReadinessState {
        &self.readiness
    }

    pub fn services(&self) -> RwLockReadGuard<'_, ServiceRegistry> {
        self.services
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn services_mut(&self) -> RwLockWriteGuard<'_, ServiceRegistry> {
        self.services
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Terminal startup report, present once readiness settles.
    pub fn report(&self) -> Option<StartupReport> {
        self.report
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn publish_report(&self, report: StartupReport) {
        let mut slot = self
            .report
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_none() {
            *slot = Some(report);
        }
    }
}

impl std::fmt::Debug for StartupContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupContext")
            .field("environment", &self.environment)
            .field("services", &*self.services())
            .finish()
    }
}

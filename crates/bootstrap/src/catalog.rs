//! Service construction interface.
//!
//! The sequencer never builds a database pool or an HTTP client itself.
//! It drives a [`ServiceCatalog`], which owns real construction, and files
//! the returned handles on the shared context. The server crate provides
//! the production catalog; tests provide mocks.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::Environment;
use events::EventBus;

/// Narrow view of one initialized subsystem.
///
/// Startup never reaches inside a service. It stores the handle, checks
/// that the owning phase registered it, and polls `healthy` during the
/// finalize health audit.
#[async_trait]
pub trait ServiceHandle: Send + Sync {
    /// Logical name, matching the critical-service vocabulary.
    fn service_name(&self) -> &'static str;

    /// Cheap liveness poll. The default is for handles with no meaningful
    /// degraded state.
    async fn healthy(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceHandle({})", self.service_name())
    }
}

pub type SharedHandle = Arc<dyn ServiceHandle>;

/// Constructors for every subsystem the startup sequence brings up,
/// one method per service, grouped here so the phase steps stay thin.
///
/// Methods returning `Option<SharedHandle>` are optional services:
/// `Ok(None)` means not configured in this deployment and is logged at
/// debug, while `Err` is reported as a degradation warning. Neither
/// fails the boot.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Validate environment variables, credentials and runtime
    /// directories before anything else runs.
    async fn validate_environment(&self, environment: Environment) -> anyhow::Result<()>;

    /// Open the message bridge session used for cross-process delivery.
    async fn connect_bridge(&self) -> anyhow::Result<SharedHandle>;

    /// Probe the remaining external collaborators. Probes within this
    /// call may run concurrently; the call returns once all have
    /// answered.
    async fn probe_dependencies(&self) -> anyhow::Result<()>;

    /// Connect the primary relational store and run its migrations.
    async fn connect_store(&self) -> anyhow::Result<SharedHandle>;

    /// Connect the secondary analytics store, if configured.
    async fn connect_analytics(&self) -> anyhow::Result<Option<SharedHandle>>;

    /// Connect the cache layer.
    async fn connect_cache(&self) -> anyhow::Result<SharedHandle>;

    /// Load signing and verification key material.
    async fn load_key_manager(&self) -> anyhow::Result<SharedHandle>;

    /// Assemble the platform tool registry.
    async fn build_tool_registry(&self) -> anyhow::Result<SharedHandle>;

    /// Spawn the background worker pool.
    async fn spawn_workers(&self) -> anyhow::Result<SharedHandle>;

    /// Start the metrics exporter, if configured.
    async fn start_metrics_exporter(&self) -> anyhow::Result<Option<SharedHandle>>;

    /// Open the client-facing realtime channel on top of the process
    /// event bus.
    async fn open_realtime(&self, bus: &EventBus) -> anyhow::Result<SharedHandle>;
}

//! Phase step plan.
//!
//! Each phase owns an ordered list of named steps. A step does one thing:
//! call a catalog constructor, file the handle on the context, announce
//! it on the bus. The sequencer applies timeouts and failure handling
//! uniformly around them, so none of that appears here.

use async_trait::async_trait;
use beacon_core::Phase;
use events::Event;
use tracing::debug;

use crate::audit;
use crate::catalog::ServiceCatalog;
use crate::context::StartupContext;
use crate::error::StartupError;
use crate::policy::AuditPolicy;

/// One named unit of phase work.
#[async_trait]
pub trait StartupStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Optional steps log their failure and never fail the phase.
    fn optional(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()>;
}

/// Ordered steps for all seven phases.
pub struct StartupPlan {
    steps: [Vec<Box<dyn StartupStep>>; Phase::COUNT],
}

impl StartupPlan {
    pub fn empty() -> Self {
        Self {
            steps: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// The full production plan.
    pub fn standard(policy: AuditPolicy) -> Self {
        Self::empty()
            .with_steps(Phase::Init, vec![Box::new(ValidateEnvironment)])
            .with_steps(
                Phase::Dependencies,
                vec![Box::new(ConnectBridge), Box::new(ProbeDependencies)],
            )
            .with_steps(
                Phase::Database,
                vec![Box::new(ConnectStore), Box::new(ConnectAnalytics)],
            )
            .with_steps(Phase::Cache, vec![Box::new(ConnectCache)])
            .with_steps(
                Phase::Services,
                vec![
                    Box::new(LoadKeyManager),
                    Box::new(BuildToolRegistry),
                    Box::new(SpawnWorkers),
                    Box::new(StartMetricsExporter),
                ],
            )
            .with_steps(Phase::Realtime, vec![Box::new(OpenRealtime)])
            .with_steps(
                Phase::Finalize,
                vec![
                    Box::new(RunHealthAudit { policy }),
                    Box::new(RunCommunicationAudit { policy }),
                ],
            )
    }

    /// Replace the steps for one phase. Used by embedders and tests to
    /// substitute phase work while keeping the sequencing machinery.
    pub fn with_steps(mut self, phase: Phase, steps: Vec<Box<dyn StartupStep>>) -> Self {
        self.steps[phase.index()] = steps;
        self
    }

    pub fn steps_for(&self, phase: Phase) -> &[Box<dyn StartupStep>] {
        &self.steps[phase.index()]
    }

    pub fn step_count(&self) -> usize {
        self.steps.iter().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for StartupPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("StartupPlan");
        for phase in Phase::ALL {
            let names: Vec<&'static str> = self
                .steps_for(phase)
                .iter()
                .map(|step| step.name())
                .collect();
            dbg.field(phase.as_str(), &names);
        }
        dbg.finish()
    }
}

fn announce(ctx: &StartupContext, phase: Phase, service: &'static str) {
    debug!(service, phase = %phase, "service handle registered");
    ctx.events().emit(Event::ServiceRegistered {
        service: service.to_string(),
        phase: phase.as_str().to_string(),
    });
}

// Init

struct ValidateEnvironment;

#[async_trait]
impl StartupStep for ValidateEnvironment {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        catalog
            .validate_environment(ctx.environment())
            .await
            .map_err(|e| StartupError::Configuration(format!("{e:#}")))?;
        Ok(())
    }
}

// Dependencies

struct ConnectBridge;

#[async_trait]
impl StartupStep for ConnectBridge {
    fn name(&self) -> &'static str {
        "bridge"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.connect_bridge().await?;
        ctx.services_mut().bridge = Some(handle);
        announce(ctx, Phase::Dependencies, "bridge");
        Ok(())
    }
}

struct ProbeDependencies;

#[async_trait]
impl StartupStep for ProbeDependencies {
    fn name(&self) -> &'static str {
        "dependency_probes"
    }

    async fn run(&self, _ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        catalog.probe_dependencies().await
    }
}

// Database

struct ConnectStore;

#[async_trait]
impl StartupStep for ConnectStore {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.connect_store().await?;
        ctx.services_mut().store = Some(handle);
        announce(ctx, Phase::Database, "store");
        Ok(())
    }
}

struct ConnectAnalytics;

#[async_trait]
impl StartupStep for ConnectAnalytics {
    fn name(&self) -> &'static str {
        "analytics"
    }

    fn optional(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        match catalog.connect_analytics().await? {
            Some(handle) => {
                ctx.services_mut().analytics = Some(handle);
                announce(ctx, Phase::Database, "analytics");
            }
            None => debug!("analytics store not configured; skipping"),
        }
        Ok(())
    }
}

// Cache

struct ConnectCache;

#[async_trait]
impl StartupStep for ConnectCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.connect_cache().await?;
        ctx.services_mut().cache = Some(handle);
        announce(ctx, Phase::Cache, "cache");
        Ok(())
    }
}

// Services

struct LoadKeyManager;

#[async_trait]
impl StartupStep for LoadKeyManager {
    fn name(&self) -> &'static str {
        "key_manager"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.load_key_manager().await?;
        ctx.services_mut().key_manager = Some(handle);
        announce(ctx, Phase::Services, "key_manager");
        Ok(())
    }
}

struct BuildToolRegistry;

#[async_trait]
impl StartupStep for BuildToolRegistry {
    fn name(&self) -> &'static str {
        "tool_registry"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.build_tool_registry().await?;
        ctx.services_mut().tool_registry = Some(handle);
        announce(ctx, Phase::Services, "tool_registry");
        Ok(())
    }
}

struct SpawnWorkers;

#[async_trait]
impl StartupStep for SpawnWorkers {
    fn name(&self) -> &'static str {
        "workers"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.spawn_workers().await?;
        ctx.services_mut().workers = Some(handle);
        announce(ctx, Phase::Services, "workers");
        Ok(())
    }
}

struct StartMetricsExporter;

#[async_trait]
impl StartupStep for StartMetricsExporter {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn optional(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        match catalog.start_metrics_exporter().await? {
            Some(handle) => {
                ctx.services_mut().metrics = Some(handle);
                announce(ctx, Phase::Services, "metrics");
            }
            None => debug!("metrics exporter not configured; skipping"),
        }
        Ok(())
    }
}

// Realtime

struct OpenRealtime;

#[async_trait]
impl StartupStep for OpenRealtime {
    fn name(&self) -> &'static str {
        "realtime"
    }

    async fn run(&self, ctx: &StartupContext, catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let handle = catalog.open_realtime(ctx.events()).await?;
        ctx.services_mut().realtime = Some(handle);
        announce(ctx, Phase::Realtime, "realtime");
        Ok(())
    }
}

// Finalize

struct RunHealthAudit {
    policy: AuditPolicy,
}

#[async_trait]
impl StartupStep for RunHealthAudit {
    fn name(&self) -> &'static str {
        "health_audit"
    }

    async fn run(&self, ctx: &StartupContext, _catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let report = audit::system_health_audit(ctx).await;
        report.enforce(Phase::Finalize, self.policy, ctx)?;
        Ok(())
    }
}

struct RunCommunicationAudit {
    policy: AuditPolicy,
}

#[async_trait]
impl StartupStep for RunCommunicationAudit {
    fn name(&self) -> &'static str {
        "communication_audit"
    }

    async fn run(&self, ctx: &StartupContext, _catalog: &dyn ServiceCatalog) -> anyhow::Result<()> {
        let report = audit::communication_path_audit(ctx).await;
        report.enforce(Phase::Finalize, self.policy, ctx)?;
        Ok(())
    }
}

//! Phase sequencer.
//!
//! Drives the seven startup phases in their fixed order: enter a phase,
//! run its steps under the environment's timeout bound, validate the
//! critical services it owed, then move on. The first failure stops the
//! walk; nothing downstream executes.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::{Phase, RuntimeMode};
use events::Event;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::catalog::ServiceCatalog;
use crate::config::TimeoutConfig;
use crate::context::StartupContext;
use crate::error::{Result, StartupError};
use crate::gate::{CompletionGate, FailureReporter};
use crate::plan::{StartupPlan, StartupStep};
use crate::policy::AuditPolicy;
use crate::registry::PhaseRegistry;
use crate::validator;

pub struct PhaseSequencer {
    ctx: Arc<StartupContext>,
    catalog: Arc<dyn ServiceCatalog>,
    plan: StartupPlan,
    timeouts: TimeoutConfig,
    mode: RuntimeMode,
    registry: PhaseRegistry,
}

impl PhaseSequencer {
    /// Build a sequencer with defaults derived from the context's
    /// environment: the standard plan, that environment's timeout tier,
    /// and service runtime mode.
    pub fn new(ctx: Arc<StartupContext>, catalog: Arc<dyn ServiceCatalog>) -> Self {
        let environment = ctx.environment();
        Self {
            plan: StartupPlan::standard(AuditPolicy::resolve(environment, false)),
            timeouts: TimeoutConfig::for_environment(environment),
            mode: RuntimeMode::Service,
            registry: PhaseRegistry::new(),
            catalog,
            ctx,
        }
    }

    /// Rebuild the standard plan under `policy`. Call before
    /// [`with_plan`](Self::with_plan) customizations, which it would
    /// overwrite.
    pub fn with_policy(mut self, policy: AuditPolicy) -> Self {
        self.plan = StartupPlan::standard(policy);
        self
    }

    pub fn with_plan(mut self, plan: StartupPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn context(&self) -> &Arc<StartupContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    /// Run the full sequence and settle process readiness.
    ///
    /// This is the single entry point a binary calls once at boot. On
    /// success the completion gate flips the process ready; on any error
    /// the failure reporter publishes terminal diagnostics. Either way
    /// readiness settles exactly once.
    pub async fn initialize(&mut self) -> Result<()> {
        match self.run().await {
            Ok(()) => match CompletionGate::mark_complete(&self.registry, &self.ctx) {
                Ok(()) => Ok(()),
                Err(gate_error) => {
                    FailureReporter::record(&gate_error, &self.registry, &self.ctx);
                    Err(gate_error)
                }
            },
            Err(run_error) => {
                FailureReporter::record(&run_error, &self.registry, &self.ctx);
                Err(run_error)
            }
        }
    }

    /// Walk the phases without touching terminal readiness. Exposed for
    /// harnesses that settle readiness themselves.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            environment = %self.ctx.environment(),
            mode = self.mode.as_str(),
            steps = self.plan.step_count(),
            "beginning startup sequence"
        );
        for phase in Phase::ALL {
            self.enter_phase(phase)?;
            match self.run_phase(phase).await {
                Ok(()) => self.complete_phase(phase),
                Err(error) => return Err(self.fail_phase(phase, error)),
            }
        }
        Ok(())
    }

    fn enter_phase(&mut self, phase: Phase) -> Result<()> {
        self.registry.enter(phase)?;
        self.ctx
            .readiness()
            .enter_phase(phase, self.registry.completed().len());
        info!(
            phase = %phase,
            index = phase.index() + 1,
            total = Phase::COUNT,
            "entering startup phase"
        );
        self.ctx.events().emit(Event::PhaseStarted {
            phase: phase.as_str().to_string(),
            index: phase.index(),
            total: Phase::COUNT,
        });
        Ok(())
    }

    async fn run_phase(&self, phase: Phase) -> Result<()> {
        let bound = self.timeouts.bound(phase);
        for step in self.plan.steps_for(phase) {
            self.run_step(phase, bound, step.as_ref()).await?;
        }
        validator::validate(phase, &self.ctx.services())
    }

    async fn run_step(&self, phase: Phase, bound: Duration, step: &dyn StartupStep) -> Result<()> {
        debug!(
            phase = %phase,
            step = step.name(),
            timeout_ms = bound.as_millis() as u64,
            "running startup step"
        );
        let started = tokio::time::Instant::now();
        match timeout(bound, step.run(&self.ctx, self.catalog.as_ref())).await {
            Ok(Ok(())) => {
                debug!(phase = %phase, step = step.name(), "startup step finished");
                Ok(())
            }
            Ok(Err(step_error)) => {
                if step.optional() {
                    self.skip_optional(phase, step, &format!("{step_error:#}"));
                    return Ok(());
                }
                // Steps may raise typed startup errors; keep those intact.
                Err(match step_error.downcast::<StartupError>() {
                    Ok(typed) => typed,
                    Err(other) => StartupError::step_failed(phase, step.name(), &other),
                })
            }
            Err(_) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if step.optional() {
                    self.skip_optional(phase, step, &format!("timed out after {elapsed_ms}ms"));
                    return Ok(());
                }
                Err(StartupError::StepTimeout {
                    phase,
                    step: step.name(),
                    elapsed_ms,
                })
            }
        }
    }

    fn skip_optional(&self, phase: Phase, step: &dyn StartupStep, reason: &str) {
        warn!(
            phase = %phase,
            step = step.name(),
            reason,
            "optional step failed; continuing without it"
        );
        self.ctx.events().emit(Event::Warning {
            message: format!("optional service {} unavailable: {reason}", step.name()),
            context: Some(phase.as_str().to_string()),
        });
    }

    fn complete_phase(&mut self, phase: Phase) {
        let duration_ms = self.registry.complete(phase).as_millis() as u64;
        self.ctx
            .readiness()
            .record_progress(self.registry.completed().len());
        info!(phase = %phase, duration_ms, "startup phase completed");
        self.ctx.events().emit(Event::PhaseCompleted {
            phase: phase.as_str().to_string(),
            duration_ms,
        });
    }

    fn fail_phase(&mut self, phase: Phase, error: StartupError) -> StartupError {
        self.registry.fail(phase);
        self.ctx.readiness().record_error(phase, &error.to_string());
        error!(phase = %phase, error = %error, "startup phase failed");
        self.ctx.events().emit(Event::PhaseFailed {
            phase: phase.as_str().to_string(),
            error: error.to_string(),
        });

        match self.mode {
            RuntimeMode::Service => {
                let mut services = self.ctx.services_mut();
                let dropped = services.registered_count();
                services.clear();
                debug!(dropped, "dropped service handles after startup failure");
            }
            RuntimeMode::Harness => {
                debug!("harness mode; preserving service handles for inspection");
            }
        }
        error
    }
}

impl std::fmt::Debug for PhaseSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseSequencer")
            .field("mode", &self.mode)
            .field("current", &self.registry.current())
            .field("completed", &self.registry.completed().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use beacon_core::Environment;
    use events::EventBus;

    use super::*;
    use crate::catalog::{ServiceHandle, SharedHandle};
    use crate::readiness::StartupOutcome;

    struct Stub {
        name: &'static str,
        healthy: bool,
    }

    #[async_trait]
    impl ServiceHandle for Stub {
        fn service_name(&self) -> &'static str {
            self.name
        }

        async fn healthy(&self) -> bool {
            self.healthy
        }
    }

    fn handle(name: &'static str, healthy: bool) -> SharedHandle {
        Arc::new(Stub { name, healthy })
    }

    #[derive(Default)]
    struct MockCatalog {
        fail_env: bool,
        fail_bridge: bool,
        fail_store: bool,
        hang_store: bool,
        analytics_error: bool,
        metrics_configured: bool,
        unhealthy_cache: bool,
    }

    #[async_trait]
    impl ServiceCatalog for MockCatalog {
        async fn validate_environment(&self, _environment: Environment) -> anyhow::Result<()> {
            if self.fail_env {
                anyhow::bail!("BEACON_SECRET is not set");
            }
            Ok(())
        }

        async fn connect_bridge(&self) -> anyhow::Result<SharedHandle> {
            if self.fail_bridge {
                anyhow::bail!("bridge connection refused");
            }
            Ok(handle("bridge", true))
        }

        async fn probe_dependencies(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn connect_store(&self) -> anyhow::Result<SharedHandle> {
            if self.hang_store {
                futures::future::pending::<()>().await;
            }
            if self.fail_store {
                anyhow::bail!("store migrations failed");
            }
            Ok(handle("store", true))
        }

        async fn connect_analytics(&self) -> anyhow::Result<Option<SharedHandle>> {
            if self.analytics_error {
                anyhow::bail!("analytics endpoint unreachable");
            }
            Ok(None)
        }

        async fn connect_cache(&self) -> anyhow::Result<SharedHandle> {
            Ok(handle("cache", !self.unhealthy_cache))
        }

        async fn load_key_manager(&self) -> anyhow::Result<SharedHandle> {
            Ok(handle("key_manager", true))
        }

        async fn build_tool_registry(&self) -> anyhow::Result<SharedHandle> {
            Ok(handle("tool_registry", true))
        }

        async fn spawn_workers(&self) -> anyhow::Result<SharedHandle> {
            Ok(handle("workers", true))
        }

        async fn start_metrics_exporter(&self) -> anyhow::Result<Option<SharedHandle>> {
            Ok(self.metrics_configured.then(|| handle("metrics", true)))
        }

        async fn open_realtime(&self, _bus: &EventBus) -> anyhow::Result<SharedHandle> {
            Ok(handle("realtime", true))
        }
    }

    fn sequencer(catalog: MockCatalog) -> PhaseSequencer {
        let ctx = Arc::new(StartupContext::new(Environment::Test));
        PhaseSequencer::new(ctx, Arc::new(catalog))
    }

    #[tokio::test]
    async fn test_full_startup_reaches_ready() {
        let mut seq = sequencer(MockCatalog::default());
        seq.initialize().await.unwrap();

        let snapshot = seq.context().readiness().snapshot();
        assert!(snapshot.ready);
        assert!(!snapshot.in_progress);
        assert!(!snapshot.failed);
        assert_eq!(snapshot.progress_percent, 100);

        assert_eq!(seq.registry().completed().len(), Phase::COUNT);
        assert!(seq.registry().failed().is_empty());
        assert_eq!(seq.context().services().registered_count(), 7);

        let report = seq.context().report().unwrap();
        assert_eq!(report.outcome, StartupOutcome::Ready);
        assert_eq!(report.timings.len(), Phase::COUNT);
    }

    #[tokio::test]
    async fn test_phase_events_follow_declared_order() {
        let ctx = Arc::new(StartupContext::new(Environment::Test));
        let mut rx = ctx.events().subscribe();
        let mut seq = PhaseSequencer::new(ctx, Arc::new(MockCatalog::default()));
        seq.initialize().await.unwrap();

        let mut started = Vec::new();
        let mut completed = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            match envelope.event {
                Event::PhaseStarted { phase, .. } => {
                    // No phase may start before its predecessor completed.
                    assert_eq!(started.len(), completed.len());
                    started.push(phase);
                }
                Event::PhaseCompleted { phase, .. } => completed.push(phase),
                _ => {}
            }
        }

        let expected: Vec<String> = Phase::ALL
            .iter()
            .map(|phase| phase.as_str().to_string())
            .collect();
        assert_eq!(started, expected);
        assert_eq!(completed, expected);
    }

    #[tokio::test]
    async fn test_store_failure_stops_the_sequence() {
        let mut seq = sequencer(MockCatalog {
            fail_store: true,
            ..Default::default()
        });
        let err = seq.initialize().await.unwrap_err();
        match &err {
            StartupError::StepFailed {
                phase,
                step,
                reason,
            } => {
                assert_eq!(*phase, Phase::Database);
                assert_eq!(*step, "store");
                assert!(reason.contains("migrations failed"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let completed: Vec<Phase> = seq.registry().completed().iter().copied().collect();
        assert_eq!(completed, vec![Phase::Init, Phase::Dependencies]);
        let failed: Vec<Phase> = seq.registry().failed().iter().copied().collect();
        assert_eq!(failed, vec![Phase::Database]);

        let snapshot = seq.context().readiness().snapshot();
        assert!(snapshot.failed);
        assert!(!snapshot.ready);
        assert!(!snapshot.in_progress);
        assert_eq!(snapshot.phase, "database");
        assert!(snapshot.error.unwrap().contains("store"));

        let report = seq.context().report().unwrap();
        assert_eq!(report.outcome, StartupOutcome::Failed);
        assert_eq!(report.failed_phase, Some(Phase::Database));
    }

    #[tokio::test]
    async fn test_service_mode_drops_handles_on_failure() {
        let mut seq = sequencer(MockCatalog {
            fail_store: true,
            ..Default::default()
        });
        seq.initialize().await.unwrap_err();
        assert_eq!(seq.context().services().registered_count(), 0);
    }

    #[tokio::test]
    async fn test_harness_mode_preserves_handles_on_failure() {
        let mut seq = sequencer(MockCatalog {
            fail_store: true,
            ..Default::default()
        })
        .with_mode(RuntimeMode::Harness);
        seq.initialize().await.unwrap_err();

        // The bridge connected during the dependencies phase and survives
        // for post-mortem inspection.
        assert!(seq.context().services().bridge.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_step_times_out_at_the_phase_bound() {
        let mut seq = sequencer(MockCatalog {
            hang_store: true,
            ..Default::default()
        });
        let err = seq.initialize().await.unwrap_err();
        match err {
            StartupError::StepTimeout {
                phase,
                step,
                elapsed_ms,
            } => {
                assert_eq!(phase, Phase::Database);
                assert_eq!(step, "store");
                // Test tier bounds every phase at two seconds.
                assert!(elapsed_ms >= 2_000);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(seq.context().readiness().snapshot().failed);
    }

    #[tokio::test]
    async fn test_validation_catches_steps_that_register_nothing() {
        struct Silent;

        #[async_trait]
        impl StartupStep for Silent {
            fn name(&self) -> &'static str {
                "silent_store"
            }

            async fn run(
                &self,
                _ctx: &StartupContext,
                _catalog: &dyn ServiceCatalog,
            ) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let plan = StartupPlan::standard(AuditPolicy::resolve(Environment::Test, false))
            .with_steps(Phase::Database, vec![Box::new(Silent)]);
        let ctx = Arc::new(StartupContext::new(Environment::Test));
        let mut seq =
            PhaseSequencer::new(ctx, Arc::new(MockCatalog::default())).with_plan(plan);

        let err = seq.initialize().await.unwrap_err();
        match err {
            StartupError::ServicesMissing { phase, missing } => {
                assert_eq!(phase, Phase::Database);
                assert_eq!(missing, vec!["store"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(seq.registry().failed().contains(&Phase::Database));
    }

    #[tokio::test]
    async fn test_optional_analytics_failure_does_not_stop_startup() {
        let ctx = Arc::new(StartupContext::new(Environment::Test));
        let mut rx = ctx.events().subscribe();
        let mut seq = PhaseSequencer::new(
            ctx.clone(),
            Arc::new(MockCatalog {
                analytics_error: true,
                ..Default::default()
            }),
        );
        seq.initialize().await.unwrap();

        assert!(ctx.readiness().snapshot().ready);
        assert!(ctx.services().analytics.is_none());

        let mut warned = false;
        while let Ok(envelope) = rx.try_recv() {
            if let Event::Warning { message, .. } = envelope.event {
                if message.contains("analytics") {
                    warned = true;
                }
            }
        }
        assert!(warned, "expected a degradation warning on the bus");
    }

    #[tokio::test]
    async fn test_configured_metrics_exporter_is_registered() {
        let mut seq = sequencer(MockCatalog {
            metrics_configured: true,
            ..Default::default()
        });
        seq.initialize().await.unwrap();
        assert!(seq.context().services().metrics.is_some());
        assert_eq!(seq.context().services().registered_count(), 8);
    }

    #[tokio::test]
    async fn test_environment_validation_failure_is_configuration_error() {
        let mut seq = sequencer(MockCatalog {
            fail_env: true,
            ..Default::default()
        });
        let err = seq.initialize().await.unwrap_err();
        match &err {
            StartupError::Configuration(reason) => {
                assert!(reason.contains("BEACON_SECRET"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // The reporter attributes phaseless errors to the current phase.
        assert_eq!(seq.context().readiness().snapshot().phase, "init");
    }

    #[tokio::test]
    async fn test_strict_policy_aborts_on_unhealthy_service() {
        let ctx = Arc::new(StartupContext::new(Environment::Test));
        let mut seq = PhaseSequencer::new(
            ctx,
            Arc::new(MockCatalog {
                unhealthy_cache: true,
                ..Default::default()
            }),
        )
        .with_policy(AuditPolicy::Strict);

        let err = seq.initialize().await.unwrap_err();
        match err {
            StartupError::AuditRejected {
                phase,
                audit,
                failures,
            } => {
                assert_eq!(phase, Phase::Finalize);
                assert_eq!(audit, "system health audit");
                assert_eq!(failures, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(seq.registry().failed().contains(&Phase::Finalize));
    }

    #[tokio::test]
    async fn test_permissive_policy_tolerates_one_unhealthy_service() {
        // Test environment resolves to the permissive policy.
        let mut seq = sequencer(MockCatalog {
            unhealthy_cache: true,
            ..Default::default()
        });
        seq.initialize().await.unwrap();
        assert!(seq.context().readiness().snapshot().ready);
    }

    #[tokio::test]
    async fn test_bypass_policy_ignores_audit_findings() {
        let ctx = Arc::new(StartupContext::new(Environment::Test));
        let mut seq = PhaseSequencer::new(
            ctx,
            Arc::new(MockCatalog {
                unhealthy_cache: true,
                ..Default::default()
            }),
        )
        .with_policy(AuditPolicy::Bypass);
        seq.initialize().await.unwrap();
        assert!(seq.context().readiness().snapshot().ready);
    }

    #[tokio::test]
    async fn test_second_initialize_cannot_rerun_phases() {
        let mut seq = sequencer(MockCatalog::default());
        seq.initialize().await.unwrap();

        let err = seq.initialize().await.unwrap_err();
        assert!(matches!(err, StartupError::SequenceViolation { .. }));

        // The first terminal outcome stands.
        let snapshot = seq.context().readiness().snapshot();
        assert!(snapshot.ready);
        assert!(!snapshot.failed);
    }
}

//! Terminal readiness transitions.
//!
//! Exactly two call sites settle process readiness: the completion gate
//! on success and the failure reporter on any abort. Everything else in
//! the crate can only record progress.

use beacon_core::Phase;
use events::Event;
use tracing::{debug, error, info, warn};

use crate::context::StartupContext;
use crate::error::{Result, StartupError};
use crate::readiness::{StartupOutcome, StartupReport};
use crate::registry::PhaseRegistry;

/// Sole authority for flipping the process to ready.
pub struct CompletionGate;

impl CompletionGate {
    /// Mark the process ready for traffic.
    ///
    /// Refuses unless every phase completed and none failed, so no code
    /// path can short-circuit past the sequence. Safe to call twice
    /// after a legitimate completion; the second call is a no-op.
    pub fn mark_complete(registry: &PhaseRegistry, ctx: &StartupContext) -> Result<()> {
        if !registry.is_complete() {
            return Err(StartupError::SequenceIncomplete {
                completed: registry.completed().len(),
                failed: registry.failed().len(),
                total: Phase::COUNT,
            });
        }

        let total_ms = registry.total_duration().as_millis() as u64;
        if !ctx.readiness().publish_ready(Phase::COUNT) {
            // A failure already settled readiness; completion loses.
            return Err(StartupError::SequenceIncomplete {
                completed: registry.completed().len(),
                failed: registry.failed().len(),
                total: Phase::COUNT,
            });
        }

        ctx.publish_report(StartupReport {
            outcome: StartupOutcome::Ready,
            failed_phase: None,
            error: None,
            completed: registry.completed().iter().copied().collect(),
            timings: registry.timing_views(),
            total_duration_ms: total_ms,
        });
        ctx.events().emit(Event::StartupComplete {
            duration_ms: total_ms,
        });
        info!(
            duration_ms = total_ms,
            services = ctx.services().registered_count(),
            "startup complete; process is ready for traffic"
        );
        Ok(())
    }
}

/// Sole authority for publishing a terminal startup failure.
pub struct FailureReporter;

impl FailureReporter {
    /// Publish failure diagnostics to shared state. At most one failure
    /// is ever published; later calls log and return.
    pub fn record(error: &StartupError, registry: &PhaseRegistry, ctx: &StartupContext) {
        let failed_phase = error.phase().or_else(|| registry.current());
        let phase_label = failed_phase.map(|p| p.as_str()).unwrap_or("unknown");

        if !ctx.readiness().publish_failed(phase_label, &error.to_string()) {
            warn!(
                phase = phase_label,
                "startup failure reported after readiness settled; ignoring"
            );
            return;
        }

        let completed: Vec<Phase> = registry.completed().iter().copied().collect();
        error!(
            phase = phase_label,
            error = %error,
            completed = ?completed,
            "startup failed; process will not accept traffic"
        );
        for timing in registry.timing_views() {
            debug!(
                phase = %timing.phase,
                duration_ms = timing.duration_ms,
                "partial startup timing"
            );
        }

        ctx.publish_report(StartupReport {
            outcome: StartupOutcome::Failed,
            failed_phase,
            error: Some(error.to_string()),
            completed,
            timings: registry.timing_views(),
            total_duration_ms: registry.total_duration().as_millis() as u64,
        });
        ctx.events().emit(Event::StartupFailed {
            phase: phase_label.to_string(),
            error: error.to_string(),
        });
    }
}

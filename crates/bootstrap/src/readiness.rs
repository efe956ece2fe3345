//! Process readiness state shared with the probe endpoints.
//!
//! The flags answer the three distinct operator questions (running?
//! accepting traffic? given up?) and move through exactly one lifecycle:
//! `in_progress` until a terminal publish, then `ready` or `failed`
//! forever. Mutators are crate-private so only the sequencer, the
//! completion gate and the failure reporter can touch them.

use std::sync::RwLock;

use beacon_core::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug)]
struct ReadinessFlags {
    ready: bool,
    in_progress: bool,
    failed: bool,
    error: Option<String>,
    phase: String,
    phases_completed: usize,
}

/// Shared readiness flags with interior mutability.
#[derive(Debug)]
pub struct ReadinessState {
    inner: RwLock<ReadinessFlags>,
}

impl ReadinessState {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(ReadinessFlags {
                ready: false,
                in_progress: true,
                failed: false,
                error: None,
                phase: "pending".to_string(),
                phases_completed: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> ReadinessSnapshot {
        let flags = self.read();
        ReadinessSnapshot {
            ready: flags.ready,
            in_progress: flags.in_progress,
            failed: flags.failed,
            error: flags.error.clone(),
            phase: flags.phase.clone(),
            progress_percent: progress_percent(flags.phases_completed),
        }
    }

    pub fn is_terminal(&self) -> bool {
        let flags = self.read();
        flags.ready || flags.failed
    }

    /// Record the phase currently executing.
    pub(crate) fn enter_phase(&self, phase: Phase, phases_completed: usize) {
        let mut flags = self.write();
        if flags.ready || flags.failed {
            return;
        }
        flags.phase = phase.as_str().to_string();
        flags.phases_completed = phases_completed;
    }

    pub(crate) fn record_progress(&self, phases_completed: usize) {
        let mut flags = self.write();
        if flags.ready || flags.failed {
            return;
        }
        flags.phases_completed = phases_completed;
    }

    /// Surface a phase error before the terminal failure publish, so a
    /// probe hitting the window between the two still sees the cause.
    pub(crate) fn record_error(&self, phase: Phase, error: &str) {
        let mut flags = self.write();
        if flags.ready || flags.failed {
            return;
        }
        flags.phase = phase.as_str().to_string();
        flags.error = Some(error.to_string());
    }

    /// Terminal success. Returns false if a terminal failure was already
    /// published; repeated success publishes are no-ops.
    pub(crate) fn publish_ready(&self, phases_completed: usize) -> bool {
        let mut flags = self.write();
        if flags.failed {
            return false;
        }
        if flags.ready {
            return true;
        }
        flags.ready = true;
        flags.in_progress = false;
        flags.phase = "complete".to_string();
        flags.phases_completed = phases_completed;
        true
    }

    /// Terminal failure. Returns false if the state was already terminal.
    pub(crate) fn publish_failed(&self, phase: &str, error: &str) -> bool {
        let mut flags = self.write();
        if flags.ready || flags.failed {
            return false;
        }
        flags.failed = true;
        flags.in_progress = false;
        flags.phase = phase.to_string();
        flags.error = Some(error.to_string());
        true
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ReadinessFlags> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ReadinessFlags> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn progress_percent(phases_completed: usize) -> u8 {
    ((phases_completed * 100) / Phase::COUNT) as u8
}

/// Point-in-time copy of the readiness flags, serialized by the probe
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadinessSnapshot {
    pub ready: bool,
    pub in_progress: bool,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub phase: String,
    pub progress_percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StartupOutcome {
    Ready,
    Failed,
}

/// Timing entry for one phase in the startup report.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhaseTimingView {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    /// None while the phase is still running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Terminal summary of a boot attempt, published exactly once by the
/// completion gate or the failure reporter and served verbatim by the
/// startup probe.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StartupReport {
    pub outcome: StartupOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed: Vec<Phase>,
    pub timings: Vec<PhaseTimingView>,
    pub total_duration_ms: u64,
}

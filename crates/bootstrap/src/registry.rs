//! Phase progress ledger.
//!
//! [`PhaseRegistry`] is the single authority on which phases have run.
//! It enforces the fixed order at entry, keeps the completed and failed
//! sets disjoint, and owns the per-phase timings that end up in the
//! startup report.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use beacon_core::Phase;
use chrono::{DateTime, Utc};

use crate::error::{Result, StartupError};
use crate::readiness::PhaseTimingView;

/// Monotonic stopwatch, one lap per phase.
///
/// Wall-clock timestamps are kept separately for reporting; durations
/// always come from `Instant` so clock adjustments cannot produce
/// negative or absurd phase times.
#[derive(Debug, Default)]
pub struct PhaseClock {
    starts: HashMap<Phase, Instant>,
}

impl PhaseClock {
    pub fn start(&mut self, phase: Phase) {
        self.starts.insert(phase, Instant::now());
    }

    pub fn elapsed(&self, phase: Phase) -> Option<Duration> {
        self.starts.get(&phase).map(Instant::elapsed)
    }
}

/// Wall-clock start and monotonic duration for one phase.
#[derive(Debug, Clone)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    /// None while the phase is running.
    pub duration: Option<Duration>,
}

#[derive(Debug)]
pub struct PhaseRegistry {
    current: Option<Phase>,
    completed: BTreeSet<Phase>,
    failed: BTreeSet<Phase>,
    timings: BTreeMap<Phase, PhaseTiming>,
    clock: PhaseClock,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self {
            current: None,
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            timings: BTreeMap::new(),
            clock: PhaseClock::default(),
        }
    }

    /// Enter the next phase. Rejects any entry that is out of order or
    /// follows a failure, so a buggy caller cannot run phases it should
    /// never reach.
    pub fn enter(&mut self, phase: Phase) -> Result<()> {
        if let Some(failed) = self.failed.iter().next() {
            return Err(StartupError::SequenceViolation {
                expected: format!("none ({failed} phase already failed)"),
                attempted: phase,
            });
        }
        let expected = Phase::ALL.get(self.completed.len()).copied();
        if expected != Some(phase) {
            return Err(StartupError::SequenceViolation {
                expected: expected
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_else(|| "none (sequence complete)".to_string()),
                attempted: phase,
            });
        }
        self.current = Some(phase);
        self.clock.start(phase);
        self.timings.insert(
            phase,
            PhaseTiming {
                phase,
                started_at: Utc::now(),
                duration: None,
            },
        );
        Ok(())
    }

    /// Mark `phase` completed and finalize its timing. Idempotent: a
    /// repeated mark returns the recorded duration without touching the
    /// ledger, and a phase already marked failed stays failed.
    pub fn complete(&mut self, phase: Phase) -> Duration {
        if self.failed.contains(&phase) {
            return self.duration_of(phase);
        }
        if !self.completed.insert(phase) {
            return self.duration_of(phase);
        }
        self.finalize_timing(phase)
    }

    /// Mark `phase` failed and finalize its timing. Same idempotence
    /// rules as [`complete`](Self::complete).
    pub fn fail(&mut self, phase: Phase) -> Duration {
        if self.completed.contains(&phase) {
            return self.duration_of(phase);
        }
        if !self.failed.insert(phase) {
            return self.duration_of(phase);
        }
        self.finalize_timing(phase)
    }

    pub fn current(&self) -> Option<Phase> {
        self.current
    }

    pub fn completed(&self) -> &BTreeSet<Phase> {
        &self.completed
    }

    pub fn failed(&self) -> &BTreeSet<Phase> {
        &self.failed
    }

    /// True once every phase completed and none failed. The completion
    /// gate refuses to mark readiness until this holds.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.completed.len() == Phase::COUNT
    }

    pub fn timing(&self, phase: Phase) -> Option<&PhaseTiming> {
        self.timings.get(&phase)
    }

    /// Timings for every phase that started, in phase order.
    pub fn timing_views(&self) -> Vec<PhaseTimingView> {
        self.timings
            .values()
            .map(|timing| PhaseTimingView {
                phase: timing.phase,
                started_at: timing.started_at,
                duration_ms: timing.duration.map(|d| d.as_millis() as u64),
            })
            .collect()
    }

    /// Sum of finalized phase durations.
    pub fn total_duration(&self) -> Duration {
        self.timings
            .values()
            .filter_map(|timing| timing.duration)
            .sum()
    }

    fn duration_of(&self, phase: Phase) -> Duration {
        self.timings
            .get(&phase)
            .and_then(|timing| timing.duration)
            .unwrap_or(Duration::ZERO)
    }

    fn finalize_timing(&mut self, phase: Phase) -> Duration {
        let elapsed = self.clock.elapsed(phase).unwrap_or(Duration::ZERO);
        if let Some(timing) = self.timings.get_mut(&phase) {
            timing.duration = Some(elapsed);
        }
        elapsed
    }
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

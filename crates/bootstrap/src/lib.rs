//! Deterministic startup orchestration for the Beacon platform.
//!
//! A Beacon process boots through seven fixed phases (init, dependencies,
//! database, cache, services, realtime, finalize). This crate owns that
//! walk: the [`PhaseSequencer`] drives phase steps under per-environment
//! timeouts, a post-phase validator proves each phase registered the
//! services it owed, and readiness flips exactly once, through the
//! [`CompletionGate`] on success or the [`FailureReporter`] on the first
//! error.
//!
//! The crate builds no services itself. Binaries supply a
//! [`ServiceCatalog`] with the real constructors and share a
//! [`StartupContext`] between the sequencer and their HTTP probes.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod plan;
pub mod policy;
pub mod readiness;
pub mod registry;
pub mod sequencer;
pub mod validator;

pub use catalog::{ServiceCatalog, ServiceHandle, SharedHandle};
pub use config::TimeoutConfig;
pub use context::{ServiceRegistry, StartupContext};
pub use error::{Result, StartupError};
pub use gate::{CompletionGate, FailureReporter};
pub use plan::{StartupPlan, StartupStep};
pub use policy::{AuditPolicy, AuditVerdict};
pub use readiness::{
    PhaseTimingView, ReadinessSnapshot, ReadinessState, StartupOutcome, StartupReport,
};
pub use registry::PhaseRegistry;
pub use sequencer::PhaseSequencer;
pub use validator::{critical_services, CriticalService};

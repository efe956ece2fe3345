//! Event types published on the Beacon event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope wrapping every event with delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new envelope with auto-generated ID and timestamp.
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All events the platform publishes.
///
/// Phase names are carried as plain strings so consumers do not need the
/// domain crates to decode them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Startup events
    /// A startup phase was entered
    #[serde(rename = "phase.started")]
    PhaseStarted {
        phase: String,
        index: usize,
        total: usize,
    },

    /// A startup phase finished successfully
    #[serde(rename = "phase.completed")]
    PhaseCompleted { phase: String, duration_ms: u64 },

    /// A startup phase failed; the sequence stops here
    #[serde(rename = "phase.failed")]
    PhaseFailed { phase: String, error: String },

    /// All phases completed and the process is ready for traffic
    #[serde(rename = "startup.complete")]
    StartupComplete { duration_ms: u64 },

    /// Startup aborted
    #[serde(rename = "startup.failed")]
    StartupFailed { phase: String, error: String },

    // Service events
    /// A service handle was registered on shared state
    #[serde(rename = "service.registered")]
    ServiceRegistered { service: String, phase: String },

    /// A running service reported unhealthy during an audit
    #[serde(rename = "service.degraded")]
    ServiceDegraded { service: String, reason: String },

    // System events
    /// Non-fatal condition worth surfacing to observers
    #[serde(rename = "warning")]
    Warning {
        message: String,
        context: Option<String>,
    },

    /// Delivery-path probe; emitted and consumed by the communication
    /// audit, harmless to other subscribers
    #[serde(rename = "system.probe")]
    Probe { token: Uuid },
}

impl Event {
    /// Get the startup phase this event belongs to, if any.
    pub fn phase(&self) -> Option<&str> {
        match self {
            Event::PhaseStarted { phase, .. } => Some(phase),
            Event::PhaseCompleted { phase, .. } => Some(phase),
            Event::PhaseFailed { phase, .. } => Some(phase),
            Event::StartupFailed { phase, .. } => Some(phase),
            Event::ServiceRegistered { phase, .. } => Some(phase),
            Event::StartupComplete { .. }
            | Event::ServiceDegraded { .. }
            | Event::Warning { .. }
            | Event::Probe { .. } => None,
        }
    }

    /// The wire name of this event, matching the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::PhaseStarted { .. } => "phase.started",
            Event::PhaseCompleted { .. } => "phase.completed",
            Event::PhaseFailed { .. } => "phase.failed",
            Event::StartupComplete { .. } => "startup.complete",
            Event::StartupFailed { .. } => "startup.failed",
            Event::ServiceRegistered { .. } => "service.registered",
            Event::ServiceDegraded { .. } => "service.degraded",
            Event::Warning { .. } => "warning",
            Event::Probe { .. } => "system.probe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_creation() {
        let event = Event::PhaseStarted {
            phase: "init".to_string(),
            index: 0,
            total: 7,
        };
        let envelope = EventEnvelope::new(event);

        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::PhaseCompleted {
            phase: "database".to_string(),
            duration_ms: 412,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("phase.completed"));
        assert!(json.contains("database"));
        assert!(json.contains("412"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"startup.failed","phase":"cache","error":"connection refused"}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::StartupFailed { phase, error } => {
                assert_eq!(phase, "cache");
                assert_eq!(error, "connection refused");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_phase_accessor() {
        let event = Event::PhaseFailed {
            phase: "realtime".to_string(),
            error: "bind failed".to_string(),
        };
        assert_eq!(event.phase(), Some("realtime"));

        let complete = Event::StartupComplete { duration_ms: 900 };
        assert_eq!(complete.phase(), None);
    }

    #[test]
    fn test_event_kind_matches_serde_tag() {
        let event = Event::Warning {
            message: "analytics store unreachable".to_string(),
            context: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(event.kind()));
    }
}

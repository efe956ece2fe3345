//! Finalize-phase supplementary audits.
//!
//! Both audits poll systems that already passed their own phase, so a
//! finding here means something degraded after initialization. How much
//! of that is tolerated is the [`AuditPolicy`]'s call, not the audits'.

use std::time::Duration;

use beacon_core::Phase;
use events::Event;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::catalog::SharedHandle;
use crate::context::StartupContext;
use crate::error::StartupError;
use crate::policy::{AuditPolicy, AuditVerdict};

/// How long the bus round-trip probe waits for its own echo.
const PROBE_WINDOW: Duration = Duration::from_millis(500);

pub const SYSTEM_HEALTH_AUDIT: &str = "system health audit";
pub const COMMUNICATION_PATH_AUDIT: &str = "communication path audit";

/// Findings from one audit pass.
#[derive(Debug)]
pub struct AuditReport {
    pub audit: &'static str,
    pub failures: Vec<String>,
}

impl AuditReport {
    /// Apply the active policy to these findings. Tolerated failures are
    /// logged and surfaced on the bus; rejection aborts startup.
    pub fn enforce(
        self,
        phase: Phase,
        policy: AuditPolicy,
        ctx: &StartupContext,
    ) -> crate::error::Result<()> {
        match policy.evaluate(self.failures.len()) {
            AuditVerdict::Pass => {
                debug!(audit = self.audit, "audit passed");
                Ok(())
            }
            AuditVerdict::Tolerated => {
                warn!(
                    audit = self.audit,
                    policy = policy.as_str(),
                    failures = ?self.failures,
                    "audit findings tolerated under policy"
                );
                ctx.events().emit(Event::Warning {
                    message: format!(
                        "{} tolerated {} finding(s) under {} policy",
                        self.audit,
                        self.failures.len(),
                        policy.as_str()
                    ),
                    context: Some(phase.as_str().to_string()),
                });
                Ok(())
            }
            AuditVerdict::Reject => Err(StartupError::AuditRejected {
                phase,
                audit: self.audit,
                failures: self.failures.len(),
            }),
        }
    }
}

/// Poll every registered handle and collect the unhealthy ones.
///
/// The polls run concurrently; one slow service cannot serialize the
/// whole audit.
pub async fn system_health_audit(ctx: &StartupContext) -> AuditReport {
    let handles: Vec<SharedHandle> = ctx.services().registered();
    let polls = handles.iter().map(|handle| async move {
        let healthy = handle.healthy().await;
        (handle.service_name(), healthy)
    });

    let mut failures = Vec::new();
    for (service, healthy) in join_all(polls).await {
        if healthy {
            continue;
        }
        warn!(service, "service reported unhealthy during finalize audit");
        ctx.events().emit(Event::ServiceDegraded {
            service: service.to_string(),
            reason: "unhealthy during finalize audit".to_string(),
        });
        failures.push(format!("{service} unhealthy"));
    }

    AuditReport {
        audit: SYSTEM_HEALTH_AUDIT,
        failures,
    }
}

/// Verify the cross-service delivery path: both endpoints of the bridge
/// plus an end-to-end echo through the event bus.
pub async fn communication_path_audit(ctx: &StartupContext) -> AuditReport {
    let mut failures = Vec::new();

    let (bridge, realtime) = {
        let services = ctx.services();
        (services.bridge.clone(), services.realtime.clone())
    };
    check_endpoint("bridge", bridge, &mut failures).await;
    check_endpoint("realtime", realtime, &mut failures).await;

    if !bus_echo(ctx).await {
        failures.push("event bus round-trip failed".to_string());
    }

    AuditReport {
        audit: COMMUNICATION_PATH_AUDIT,
        failures,
    }
}

async fn check_endpoint(
    name: &'static str,
    handle: Option<SharedHandle>,
    failures: &mut Vec<String>,
) {
    match handle {
        Some(handle) if handle.healthy().await => {}
        Some(_) => failures.push(format!("{name} endpoint unhealthy")),
        None => failures.push(format!("{name} endpoint not registered")),
    }
}

/// Emit a probe event and wait for it to come back through a fresh
/// subscription.
async fn bus_echo(ctx: &StartupContext) -> bool {
    let mut rx = ctx.events().subscribe();
    let token = uuid::Uuid::new_v4();
    ctx.events().emit(Event::Probe { token });

    let echoed = tokio::time::timeout(PROBE_WINDOW, async {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if matches!(envelope.event, Event::Probe { token: t } if t == token) {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
    })
    .await;

    matches!(echoed, Ok(true))
}

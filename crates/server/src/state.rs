use std::sync::{Arc, RwLock};

use bootstrap::StartupContext;

use crate::config::PlatformConfig;
use crate::routes::sse::{EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE};

/// Shared handler state.
///
/// The startup context is the same one the sequencer drives, so the
/// probe endpoints observe boot progress live. The event buffer backs
/// `Last-Event-ID` replay on the SSE stream and is filled by the
/// realtime pump once that service comes up.
#[derive(Clone)]
pub struct AppState {
    pub startup: Arc<StartupContext>,
    pub config: PlatformConfig,
    pub event_buffer: SharedEventBuffer,
}

impl AppState {
    pub fn new(startup: Arc<StartupContext>, config: PlatformConfig) -> Self {
        let event_buffer = Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE)));
        Self {
            startup,
            config,
            event_buffer,
        }
    }
}

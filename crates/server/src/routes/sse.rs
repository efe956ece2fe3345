use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::state::AppState;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;
pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Bounded replay buffer for reconnecting SSE clients.
///
/// The realtime pump pushes every bus envelope here; a client that
/// reconnects with a `Last-Event-ID` header gets everything it missed
/// (within the buffer window) before its live stream begins.
pub struct EventBuffer {
    events: VecDeque<events::EventEnvelope>,
    max_size: usize,
}

impl EventBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, envelope: events::EventEnvelope) {
        if self.events.len() >= self.max_size {
            self.events.pop_front();
        }
        self.events.push_back(envelope);
    }

    /// Envelopes strictly after `event_id`, oldest first. Empty when the
    /// event has already been evicted or was never buffered.
    pub fn events_after(&self, event_id: Uuid) -> Vec<events::EventEnvelope> {
        let mut found = false;
        self.events
            .iter()
            .filter_map(|envelope| {
                if found {
                    Some(envelope.clone())
                } else if envelope.id == event_id {
                    found = true;
                    None
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub type SharedEventBuffer = Arc<RwLock<EventBuffer>>;

fn envelope_to_sse_event(envelope: &events::EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.kind())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/events",
    responses(
        (status = 200, description = "SSE event stream"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<Uuid>().ok());

    let rx = state.startup.events().subscribe();

    let missed_events = if let Some(event_id) = last_event_id {
        state
            .event_buffer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .events_after(event_id)
    } else {
        vec![]
    };

    let missed_stream =
        futures::stream::iter(missed_events.into_iter().map(|e| envelope_to_sse_event(&e)));

    let live_stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(envelope) => Some(envelope_to_sse_event(&envelope)),
            Err(e) => {
                tracing::warn!("SSE broadcast error: {:?}", e);
                None
            }
        }
    });

    let stream = missed_stream.chain(live_stream);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

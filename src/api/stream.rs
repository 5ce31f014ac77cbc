//! SSE task event stream handler
//!
//! A new subscriber either replays the events it missed (when its
//! `last_event_id` is still inside the broadcaster's ring) or receives a
//! full snapshot of recent tasks plus stats, then follows live events.
//! Heartbeats carrying the last delivered event id keep idle connections
//! warm and give clients a resume cursor.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::events::{ResumeMode, StoredEvent};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub project: Option<String>,
    pub last_event_id: Option<u64>,
}

struct StreamState {
    /// Catch-up events (replayed or snapshot), delivered before live ones.
    pending: VecDeque<(u64, serde_json::Value)>,
    receiver: mpsc::UnboundedReceiver<Arc<StoredEvent>>,
    last_sent_id: u64,
    heartbeat: Duration,
}

pub async fn stream_tasks(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    // The EventSource reconnect protocol sends the cursor as a header; an
    // explicit query parameter wins when both are present.
    let last_event_id = query.last_event_id.or_else(|| {
        headers
            .get("last-event-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
    });
    let project = query.project.filter(|p| !p.is_empty());

    let subscription = state.broadcaster.subscribe(project.clone(), last_event_id);

    let mut pending = VecDeque::new();
    let last_sent_id = match subscription.resume {
        ResumeMode::Replay(events) => {
            let mut last = last_event_id.unwrap_or(0);
            for event in events {
                last = event.id;
                pending.push_back((event.id, event.payload.clone()));
            }
            last
        }
        ResumeMode::Snapshot { last_event_id } => {
            let tasks = state
                .queue
                .recent(project.as_deref(), state.settings.events.snapshot_limit);
            let stats = state.queue.stats(project.as_deref());
            pending.push_back((
                last_event_id,
                json!({
                    "type": "snapshot",
                    "tasks": tasks,
                    "stats": stats,
                    "last_event_id": last_event_id,
                }),
            ));
            last_event_id
        }
    };

    let stream_state = StreamState {
        pending,
        receiver: subscription.receiver,
        last_sent_id,
        heartbeat: Duration::from_secs(state.settings.events.heartbeat_secs),
    };

    Sse::new(futures::stream::unfold(stream_state, next_event))
}

async fn next_event(
    mut state: StreamState,
) -> Option<(std::result::Result<Event, axum::Error>, StreamState)> {
    if let Some((id, payload)) = state.pending.pop_front() {
        return Some((build_event(id, &payload), state));
    }

    match tokio::time::timeout(state.heartbeat, state.receiver.recv()).await {
        Ok(Some(stored)) => {
            state.last_sent_id = stored.id;
            Some((build_event(stored.id, &stored.payload), state))
        }
        // Broadcaster went away; end the stream.
        Ok(None) => None,
        Err(_) => {
            let payload = json!({
                "type": "heartbeat",
                "last_event_id": state.last_sent_id,
            });
            Some((build_event(state.last_sent_id, &payload), state))
        }
    }
}

fn build_event(
    id: u64,
    payload: &serde_json::Value,
) -> std::result::Result<Event, axum::Error> {
    Ok(Event::default().id(id.to_string()).json_data(payload)?)
}

//! Server-sent event stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::StreamExt as _;
use tokio::sync::watch;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use feedback_core::defaults::SSE_KEEPALIVE_SECS;
use feedback_core::EventEnvelope;

use crate::AppState;

/// Stream every event envelope published after the client connected.
///
/// The SSE event name is the short event type (`GenerateReportFinished`,
/// `WorkingSetChanged`) and the SSE id is the envelope's event id. Lagged
/// clients silently skip the events they missed. The stream ends when the
/// daemon begins shutting down.
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.events().subscribe();

    let stream = BroadcastStream::new(rx)
        .filter_map(|result| async move {
            match result {
                Ok(envelope) => match to_sse_event(&envelope) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        warn!(event_id = %envelope.event_id, error = %e, "Dropping unencodable event");
                        None
                    }
                },
                Err(_) => None, // Skip lagged errors
            }
        })
        .take_until(shutdown_requested(state.shutdown_receiver()));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}

fn to_sse_event(envelope: &EventEnvelope) -> feedback_core::Result<Event> {
    let json = serde_json::to_string(envelope)?;
    Ok(Event::default()
        .event(envelope.payload.event_type())
        .id(envelope.event_id.to_string())
        .data(json))
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

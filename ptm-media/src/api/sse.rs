//! Server-Sent Events stream of media events

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

/// GET /events
///
/// Streams every [`MediaEvent`](ptm_common::events::MediaEvent) with its
/// variant name as the SSE event type. A lagging client is told how many
/// events it missed and keeps streaming.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting event: {}", event_type);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed = missed, "SSE client lagging");
                    yield Ok(Event::default().event("Lagged").data(missed.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("SSE: Event stream closed");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}

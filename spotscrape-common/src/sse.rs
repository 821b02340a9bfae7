//! Server-Sent Events (SSE) utilities
//!
//! Turns an [`EventBus`](crate::events::EventBus) subscription into an axum
//! SSE response with a periodic heartbeat.

use crate::events::ScrapeEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Heartbeat interval used by [`scrape_event_sse_stream`]
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize one event into an SSE frame named after its variant
pub fn to_sse_event(event: &ScrapeEvent) -> Option<Event> {
    let event_type = event.event_type();
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event_type).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}

/// Forward every event from `rx` to an SSE client
///
/// Sends a `ConnectionStatus: connected` frame first, then events as they
/// arrive, and a heartbeat comment whenever the bus stays quiet for
/// `heartbeat`. Lagged receivers skip ahead; the stream ends when the bus
/// is dropped.
pub fn scrape_event_sse_stream(
    service_name: &'static str,
    mut rx: broadcast::Receiver<ScrapeEvent>,
    heartbeat: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(heartbeat) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if let Some(frame) = to_sse_event(&event) {
                                debug!("SSE: Broadcasting event: {}", event.event_type());
                                yield Ok(frame);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: {} client lagged, skipped {} events", service_name, skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: {} event bus closed", service_name);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(heartbeat).text("heartbeat"))
}

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the lobby stream carrying matchmaking events.
pub fn subscribe_lobby(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.sse().lobby().subscribe()
}

/// Subscribe to the per-match topic stream, creating the topic if needed.
pub fn subscribe_match(state: &SharedState, match_id: Uuid) -> broadcast::Receiver<ServerEvent> {
    state.sse().match_topic(match_id).subscribe()
}

/// Identifies the target SSE stream for connection bookkeeping.
#[derive(Clone, Copy)]
pub enum StreamKind {
    /// Lobby-wide matchmaking stream.
    Lobby,
    /// Topic stream of a single match.
    Match(Uuid),
}

impl StreamKind {
    fn label(&self) -> String {
        match self {
            StreamKind::Lobby => "lobby".to_owned(),
            StreamKind::Match(match_id) => match_id.to_string(),
        }
    }
}

/// Convert a broadcast receiver into an SSE response, sending an initial
/// handshake, forwarding events, and logging once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
    degraded: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        let handshake = Handshake {
            stream: kind.label(),
            degraded,
        };
        if let Ok(data) = serde_json::to_string(&handshake) {
            let event = Event::default().event(EVENT_HANDSHAKE).data(data);
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => {
                            // Skip lagged messages but keep the stream alive;
                            // clients converge by re-reading the match.
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Lobby => tracing::info!("lobby SSE stream disconnected"),
            StreamKind::Match(match_id) => {
                tracing::info!(%match_id, "match SSE stream disconnected")
            }
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

//! `/ws` endpoint: forwards hub events to one browser client.

use axum::{
    Router,
    extract::{
        FromRef, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::LiveHub;

/// Router exposing the live-update socket for any state that can hand out
/// the hub.
pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    LiveHub: FromRef<S>,
{
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<LiveHub>) -> impl IntoResponse {
    debug!("WebSocket client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(mut socket: WebSocket, hub: LiveHub) {
    let mut rx = hub.subscribe();
    info!(subscribers = hub.subscriber_count(), "WebSocket client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize live event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Missed events are gone; carry on with the next one
                        warn!(missed = n, "WS client lagged behind broadcast");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(text = %text.as_str(), "Ignoring client message");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    drop(rx);
    info!(subscribers = hub.subscriber_count(), "WebSocket connection closed");
}

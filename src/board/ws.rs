use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::api::AppState;
use super::models::{BoardView, ColumnKey, Draft};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    BoardUpdated { board: BoardView },
    PollFailed { error: String },
    ColumnsReordered { order: Vec<ColumnKey> },
    DraftsChanged { drafts: Vec<Draft> },
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, receiver) = socket.split();
    let rx = state.ws_tx.subscribe();

    // New clients get the current board without waiting for the next poll.
    let hello = WsMessage::BoardUpdated {
        board: state.board_view(),
    };
    if let Ok(json) = serde_json::to_string(&hello)
        && sender.send(Message::Text(json.into())).await.is_err()
    {
        return;
    }

    run_socket_loop(sender, receiver, rx).await;
}

/// Forward broadcasts to one client until it goes away.
///
/// Pings every [`PING_INTERVAL`]; a client that has not answered within
/// [`PONG_TIMEOUT`] is dropped.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick is immediate.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("websocket client stopped answering pings");
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "websocket client lagging");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Serialize and broadcast to all connected clients. No clients is fine.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize websocket message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_failed_serialization() {
        let msg = WsMessage::PollFailed {
            error: "Agent service returned 401: invalid api key".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"PollFailed\""));
        assert!(json.contains("\"data\""));
        assert!(json.contains("invalid api key"));
    }

    #[test]
    fn test_columns_reordered_uses_column_keys() {
        let msg = WsMessage::ColumnsReordered {
            order: vec![ColumnKey::Merged, ColumnKey::NeedsInput],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"ColumnsReordered\""));
        assert!(json.contains("[\"merged\",\"needs_input\"]"));
    }

    #[test]
    fn test_board_updated_round_trip() {
        let board = BoardView {
            columns: vec![],
            error: None,
            agents_fetched_at: None,
            pr_statuses_fetched_at: None,
            focused: false,
        };
        let json = serde_json::to_string(&WsMessage::BoardUpdated { board }).unwrap();
        let parsed: WsMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, WsMessage::BoardUpdated { .. }));
    }

    #[tokio::test]
    async fn test_broadcast_message_reaches_subscribers() {
        let (tx, mut rx) = broadcast::channel(4);
        broadcast_message(
            &tx,
            &WsMessage::PollFailed {
                error: "down".to_string(),
            },
        );
        let received = rx.recv().await.unwrap();
        assert!(received.contains("PollFailed"));
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<String>(4);
        drop(rx);
        broadcast_message(
            &tx,
            &WsMessage::DraftsChanged { drafts: vec![] },
        );
    }
}

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use helios_core::TaskId;
use tokio::sync::mpsc;

use crate::state::AppState;

const SESSION_CHANNEL_CAPACITY: usize = 64;

/// `GET /ws/logs/{task_id}`. A late subscriber whose task has already
/// reached a terminal state is closed immediately with no frames, per
/// the minimum late-subscriber contract: such a client must poll
/// `QueryStatus` instead of expecting replayed history.
pub async fn ws_logs(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    let Ok(task_id) = task_id.parse::<TaskId>() else {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, task_id, state))
}

async fn handle_socket(mut socket: WebSocket, task_id: TaskId, state: AppState) {
    if let Ok(Some(status)) = state.status_store.get(task_id).await {
        if status.is_terminal() {
            let _ = socket.close().await;
            return;
        }
    }

    let (tx, mut rx) = mpsc::channel::<Message>(SESSION_CHANNEL_CAPACITY);
    state.fanout.register(task_id, tx).await;

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
        }
    }
}

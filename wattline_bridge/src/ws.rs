//! WebSocket upgrade and per-connection handler. Pushes every forwarded line.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

use std::collections::HashMap;
use std::sync::atomic::Ordering;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if let Some(expected) = state.auth_token.as_ref() {
        match q.get("token") {
            Some(t) if t == expected => {}
            _ => return StatusCode::UNAUTHORIZED.into_response(),
        }
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Subscribe before reading the cache so nothing falls in between.
    let mut lines = state.lines.subscribe();

    let n = state.client_count.fetch_add(1, Ordering::Relaxed) + 1;
    info!(clients = n, "subscriber connected");

    // Ensure we decrement on disconnect (drop).
    struct ClientGuard(AppState);
    impl Drop for ClientGuard {
        fn drop(&mut self) {
            let n = self.0.client_count.fetch_sub(1, Ordering::Relaxed) - 1;
            info!(clients = n, "subscriber disconnected");
        }
    }
    let _guard = ClientGuard(state.clone());

    let cached = state.last_line.read().await.clone();
    if let Some(line) = cached {
        if socket.send(Message::Text(line)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Ok(line) => {
                    if socket.send(Message::Text(line)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagging, skipping ahead");
                }
                Err(RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                // Receive-only protocol: inbound frames other than close are ignored
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "subscriber socket error");
                    break;
                }
            },
        }
    }
}

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use durbar_core::net::messages::{ClientMessage, MessageType};
use durbar_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
};
use durbar_core::player::PlayerId;
use durbar_core::session::is_valid_session_code;

use crate::session_host::SessionHost;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // The first message must be a Join.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let join = match decode_client_message(&first_msg) {
        Ok(ClientMessage::Join(join)) => join,
        _ => return,
    };

    if join.protocol_version != 0 && join.protocol_version != PROTOCOL_VERSION {
        send_join_error(
            &mut ws_sender,
            &format!(
                "protocol version mismatch: client={}, server={}",
                join.protocol_version, PROTOCOL_VERSION
            ),
        )
        .await;
        return;
    }

    let display_name = join.display_name.trim().to_string();
    if display_name.is_empty()
        || display_name.len() > 32
        || display_name.chars().any(|c| c.is_control())
    {
        send_join_error(&mut ws_sender, "invalid display name").await;
        return;
    }

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let join_result = {
        let mut sessions = state.sessions.write().await;
        if join.session_code.is_empty() {
            let (code, player_id) = sessions.create_session(&display_name, tx, &state.sessions);
            Ok((code, player_id))
        } else if !is_valid_session_code(&join.session_code) {
            Err("invalid session code".to_string())
        } else {
            sessions
                .join_session(&join.session_code, &display_name, tx, &state.sessions)
                .map(|player_id| (join.session_code.clone(), player_id))
        }
    };

    let (session_code, player_id) = match join_result {
        Ok(ok) => ok,
        Err(reason) => {
            send_join_error(&mut ws_sender, &reason).await;
            return;
        },
    };

    // Ack goes out before the writer drains the queued join broadcasts, so
    // the client always sees JoinResponse first.
    let ack = match SessionHost::make_join_response(player_id, &session_code) {
        Ok(ack) => ack,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode JoinResponse");
            let mut sessions = state.sessions.write().await;
            sessions.leave_session(&session_code, player_id, &state.sessions);
            return;
        },
    };
    if ws_sender.send(Message::Binary(ack.into())).await.is_err() {
        let mut sessions = state.sessions.write().await;
        sessions.leave_session(&session_code, player_id, &state.sessions);
        return;
    }

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, &session_code, player_id).await;

    // Connection gone; remove the seat.
    {
        let mut sessions = state.sessions.write().await;
        sessions.leave_session(&session_code, player_id, &state.sessions);
    }
    tracing::info!(player_id, session = %session_code, "player disconnected");
}

async fn send_join_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    reason: &str,
) {
    if let Ok(response) = SessionHost::make_join_error(reason)
        && let Err(e) = ws_sender.send(Message::Binary(response.into())).await
    {
        tracing::warn!(error = %e, "failed to send join error response");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    session_code: &str,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(player_id, session = session_code, "rate limited");
            continue;
        }
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(_) => continue,
        };

        // Server-authoritative: lifecycle messages never come from clients.
        if msg_type.is_server_only() {
            tracing::warn!(
                player_id,
                session = session_code,
                ?msg_type,
                "rejected server-only message from client"
            );
            continue;
        }

        match msg_type {
            MessageType::Guess => {
                if let Ok(ClientMessage::Guess(guess)) = decode_client_message(&data) {
                    let mut sessions = state.sessions.write().await;
                    sessions.route_guess(session_code, player_id, guess.target_id, &state.sessions);
                }
            },
            // A second Join on an established connection is meaningless.
            MessageType::Join => {
                tracing::debug!(player_id, session = session_code, "duplicate join ignored");
            },
            _ => {},
        }
    }
}

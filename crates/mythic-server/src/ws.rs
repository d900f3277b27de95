use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, FromRequest, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mythic_core::net::messages::ServerMessage;
use mythic_core::net::protocol::MAX_MESSAGE_SIZE;

use crate::handlers::build_snapshot;
use crate::identity::credential_from_headers;
use crate::rate_limit::TokenBucket;
use crate::registry::{ConnectionId, Outbound, SessionHandle};
use crate::router::dispatch;
use crate::state::{AppState, ConnectionGuard};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_POLICY: u16 = 1008;
pub const CLOSE_INTERNAL: u16 = 1011;

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    if !state.upgrade_limiter.check_rate_limit(ip).await {
        tracing::warn!(%ip, "WS upgrade rate limited");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let credential = credential_from_headers(request.headers(), &state.config.auth.cookie_name);

    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, ip, credential))
        .into_response())
}

async fn close_now(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }));
    if let Err(e) = sink.send(frame).await {
        tracing::debug!(error = %e, "Failed to send close frame");
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, ip: IpAddr, credential: Option<String>) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn = ConnectionId::next();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let player_id = match state.identity.resolve(credential.as_deref()).await {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(conn = %conn, %ip, error = %e, "Rejected connection");
            close_now(&mut ws_sender, CLOSE_POLICY, "Invalid authentication token").await;
            return;
        },
    };

    match state.store.find_player(&player_id).await {
        Ok(Some(_)) => {},
        Ok(None) => {
            tracing::info!(conn = %conn, player_id = %player_id, "Unknown player");
            close_now(&mut ws_sender, CLOSE_POLICY, "Player not found").await;
            return;
        },
        Err(e) => {
            tracing::error!(conn = %conn, player_id = %player_id, error = %e, "Player lookup failed");
            close_now(&mut ws_sender, CLOSE_INTERNAL, "Internal server error during connection").await;
            return;
        },
    }

    let (tx, rx) = mpsc::channel(state.config.limits.outbound_buffer);
    let kill = CancellationToken::new();
    let handle = SessionHandle::new(tx, kill.clone());

    if let Err(e) = state.registry.bind(conn, player_id.clone(), handle.clone()).await {
        tracing::error!(conn = %conn, player_id = %player_id, error = %e, "Failed to bind session");
        state.registry.unbind(conn, "bind failed").await;
        close_now(&mut ws_sender, CLOSE_INTERNAL, "Internal server error during connection").await;
        return;
    }

    let writer = spawn_writer(ws_sender, rx, kill.clone());

    match build_snapshot(&state, &player_id).await {
        Ok(snapshot) => {
            if let Err(e) = handle.send(&ServerMessage::PlayerData(Box::new(snapshot))) {
                tracing::warn!(conn = %conn, error = %e, "Failed to queue initial snapshot");
            }
        },
        Err(e) => {
            tracing::warn!(conn = %conn, player_id = %player_id, error = %e, "Failed to build initial snapshot");
        },
    }

    let reason = read_loop(&mut ws_receiver, &state, conn, &handle, &kill).await;

    state.registry.unbind(conn, reason).await;
    kill.cancel();
    if let Err(e) = writer.await {
        tracing::debug!(conn = %conn, error = %e, "Writer task failed");
    }
    tracing::info!(conn = %conn, player_id = %player_id, reason, "Connection closed");
}

/// Drain the outbound queue into the socket until the queue closes, a close
/// frame is written, or the connection is killed.
fn spawn_writer(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    kill: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = kill.cancelled() => break,
                next = rx.recv() => next,
            };
            let Some(outbound) = next else { break };

            let (frame, closing) = match outbound {
                Outbound::Text(text) => (Message::Text(text.into()), false),
                Outbound::Ping => (Message::Ping(Bytes::new()), false),
                Outbound::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })),
                    true,
                ),
            };
            if let Err(e) = ws_sender.send(frame).await {
                tracing::debug!(error = %e, "WebSocket send failed");
                kill.cancel();
                break;
            }
            if closing {
                kill.cancel();
                break;
            }
        }
    })
}

/// Read frames until the peer goes away or the connection is killed.
/// Returns the reason the loop ended.
async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    conn: ConnectionId,
    handle: &SessionHandle,
    kill: &CancellationToken,
) -> &'static str {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = TokenBucket::new(rate, rate);

    loop {
        let frame = tokio::select! {
            _ = kill.cancelled() => return "terminated",
            frame = ws_receiver.next() => frame,
        };

        let text = match frame {
            None => return "client disconnected",
            Some(Err(e)) => {
                tracing::debug!(conn = %conn, error = %e, "WebSocket read failed");
                return "transport error";
            },
            Some(Ok(Message::Close(_))) => return "client closed",
            Some(Ok(Message::Pong(_))) => {
                state.registry.mark_alive(conn);
                continue;
            },
            Some(Ok(Message::Ping(_))) => continue,
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(conn = %conn, "Dropped non UTF-8 binary frame");
                    continue;
                },
            },
        };

        if !rate_limiter.allow() {
            tracing::warn!(conn = %conn, "Rate limited");
            continue;
        }

        if text.len() > MAX_MESSAGE_SIZE {
            tracing::warn!(conn = %conn, len = text.len(), "Dropped oversized frame");
            continue;
        }

        dispatch(state, conn, handle, &text).await;
    }
}

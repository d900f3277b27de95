use mythic_core::net::messages::ServerMessage;
use mythic_core::net::protocol::{ProtocolError, decode_client_message, decode_envelope};

use crate::handlers::{self, Ctx};
use crate::registry::{ConnectionId, SessionHandle};
use crate::state::AppState;

fn send(handle: &SessionHandle, conn: ConnectionId, msg: &ServerMessage) {
    if let Err(e) = handle.send(msg) {
        tracing::warn!(conn = %conn, error = %e, "Failed to queue error reply");
    }
}

/// Decode one inbound text frame and run its handler to completion.
///
/// Protocol errors are answered with an `error` message. Handler failures
/// are logged and never close the connection.
pub async fn dispatch(state: &AppState, conn: ConnectionId, handle: &SessionHandle, text: &str) {
    let envelope = match decode_envelope(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(conn = %conn, error = %e, "Unparseable frame");
            send(handle, conn, &ServerMessage::error("Invalid message format"));
            return;
        },
    };

    let Some(session) = state.registry.lookup(conn) else {
        tracing::debug!(conn = %conn, msg_type = %envelope.msg_type, "Frame on unbound connection dropped");
        return;
    };

    let msg_type = envelope.msg_type.clone();
    let msg = match decode_client_message(envelope) {
        Ok(msg) => msg,
        Err(ProtocolError::UnknownMessageType(t)) => {
            tracing::warn!(player_id = %session.player_id, msg_type = %t, "Unknown message type");
            send(handle, conn, &ServerMessage::error(format!("Unknown message type: {t}")));
            return;
        },
        Err(e) => {
            tracing::warn!(player_id = %session.player_id, msg_type = %msg_type, error = %e, "Invalid payload");
            send(handle, conn, &ServerMessage::error(format!("Invalid payload for {msg_type}")));
            return;
        },
    };

    let kind = msg.message_type();
    let ctx = Ctx {
        state,
        session: &session,
    };
    if let Err(e) = handlers::handle(&ctx, msg).await {
        tracing::warn!(
            player_id = %session.player_id,
            conn = %conn,
            msg_type = kind.as_str(),
            error = %e,
            "Handler failed"
        );
    }
}

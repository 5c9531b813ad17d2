use super::protocol as ws_protocol;
use super::relay::SignalRelay;
use crate::error::{current_request_id, request_id_from_headers_or_generate, with_request_id_scope};
use crate::metrics;
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Router,
};
use consult_common::types::ConnectionId;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

pub(crate) const MAX_FRAME_BYTES: usize = 262_144;

#[derive(Clone)]
pub(crate) struct SignalRouterState {
    pub(crate) relay: Arc<SignalRelay>,
    pub(crate) max_frame_bytes: usize,
}

pub fn router(relay: Arc<SignalRelay>, max_frame_bytes: usize) -> Router {
    let state = SignalRouterState { relay, max_frame_bytes };

    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

pub(crate) async fn ws_upgrade(
    State(state): State<SignalRouterState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let request_id = request_id_from_headers_or_generate(&headers);
    let max_frame_bytes = state.max_frame_bytes;
    ws.max_frame_size(max_frame_bytes).max_message_size(max_frame_bytes).on_upgrade(
        move |socket| async move {
            with_request_id_scope(request_id, handle_socket(state.relay, max_frame_bytes, socket))
                .await;
        },
    )
}

fn frame_size_exceeded_reason(max_frame_bytes: usize) -> String {
    format!("websocket frame exceeds maximum size of {max_frame_bytes} bytes")
}

fn is_frame_size_violation(error: &axum::Error) -> bool {
    let message = error.to_string().to_ascii_lowercase();
    message.contains("message too long")
        || message.contains("frame too long")
        || message.contains("too large")
        || message.contains("too big")
        || message.contains("size limit")
}

async fn close_frame_too_large(socket: &mut WebSocket, max_frame_bytes: usize) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::SIZE,
            reason: frame_size_exceeded_reason(max_frame_bytes).into(),
        })))
        .await;
}

async fn handle_socket(relay: Arc<SignalRelay>, max_frame_bytes: usize, mut socket: WebSocket) {
    let request_id = current_request_id().unwrap_or_else(|| "unknown".to_string());
    let (connection_id, mut outbound_receiver) = relay.connect().await;
    info!(connection_id = %connection_id, request_id = %request_id, "connection opened");

    loop {
        tokio::select! {
            maybe_outbound = outbound_receiver.recv() => {
                match maybe_outbound {
                    Some(outbound_message) => {
                        if ws_protocol::send_ws_message(&mut socket, &outbound_message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            maybe_message = socket.recv() => {
                let Some(message) = maybe_message else {
                    break;
                };

                match message {
                    Ok(Message::Text(raw_message)) => {
                        if raw_message.len() > max_frame_bytes {
                            close_frame_too_large(&mut socket, max_frame_bytes).await;
                            break;
                        }
                        handle_text_frame(&relay, connection_id, &raw_message).await;
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(error) => {
                        if is_frame_size_violation(&error) {
                            close_frame_too_large(&mut socket, max_frame_bytes).await;
                        }
                        break;
                    }
                }
            }
        }
    }

    // Vanishing without leave-room still releases the room slot.
    relay.disconnect(connection_id).await;
    metrics::record_ws_event("disconnect", None, 0);
    info!(connection_id = %connection_id, request_id = %request_id, "connection closed");
}

/// Decode one text frame and apply it. Anything that cannot be applied is
/// dropped without a reply.
pub(crate) async fn handle_text_frame(relay: &SignalRelay, connection_id: ConnectionId, raw: &str) {
    let started_at = Instant::now();
    let inbound = match ws_protocol::decode_message(raw) {
        Ok(message) => message,
        Err(error) => {
            debug!(connection_id = %connection_id, error = %error, "dropping undecodable frame");
            metrics::record_ws_event("unknown", Some("malformed"), 0);
            return;
        }
    };

    let event = inbound.event_name();
    let outcome = relay.handle(connection_id, inbound).await;
    let elapsed_ms = started_at.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => metrics::record_ws_event(event, None, elapsed_ms),
        Err(dropped) => {
            debug!(
                connection_id = %connection_id,
                event,
                reason = dropped.reason(),
                "dropping event: {dropped}"
            );
            metrics::record_ws_event(event, Some(dropped.reason()), elapsed_ms);
        }
    }
}

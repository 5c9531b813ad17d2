// WebSocket message types for the consult-signal.v1 protocol.
//
// Event names and field names are derived from contracts/signal-protocol.json.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, Identity};

pub const CURRENT_PROTOCOL_VERSION: &str = "consult-signal.v1";

// ── Event names ────────────────────────────────────────────────────
pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_JOIN_ROOM: &str = "join-room";
pub const EVENT_LEAVE_ROOM: &str = "leave-room";
pub const EVENT_SIGNAL: &str = "signal";
pub const EVENT_CHAT_MESSAGE: &str = "chat-message";
pub const EVENT_EXISTING_PEERS: &str = "existing-peers";
pub const EVENT_PEER_JOINED: &str = "peer-joined";
pub const EVENT_PEER_LEFT: &str = "peer-left";

/// Client -> Server frames.
///
/// Every field is optional here: a frame missing a required field still
/// decodes, and the relay drops it as malformed instead of failing the
/// whole frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Enter a room, announcing an identity descriptor to its members.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<serde_json::Value>,
    },

    /// Opaque negotiation payload addressed to one peer.
    #[serde(rename_all = "camelCase")]
    Signal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_connection_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },

    /// Chat text for every other member of the sender's room.
    ChatMessage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    LeaveRoom,
}

impl ClientMessage {
    /// Wire name of this event, used for logs and metric labels.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => EVENT_JOIN_ROOM,
            Self::Signal { .. } => EVENT_SIGNAL,
            Self::ChatMessage { .. } => EVENT_CHAT_MESSAGE,
            Self::LeaveRoom => EVENT_LEAVE_ROOM,
        }
    }
}

/// One room member as seen by its peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub connection_id: ConnectionId,
    pub identity: Identity,
}

/// Server -> Client frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once after the upgrade so the client learns its own id.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },

    /// Members already present when the receiver joined. Never includes
    /// the receiver itself.
    ExistingPeers { peers: Vec<PeerSummary> },

    #[serde(rename_all = "camelCase")]
    PeerJoined { connection_id: ConnectionId, identity: Identity },

    #[serde(rename_all = "camelCase")]
    PeerLeft { connection_id: ConnectionId },

    /// Relayed negotiation payload, tagged with the true sender.
    Signal { from: ConnectionId, payload: serde_json::Value },

    ChatMessage { sender: Identity, message: String, timestamp: String },
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => EVENT_CONNECTED,
            Self::ExistingPeers { .. } => EVENT_EXISTING_PEERS,
            Self::PeerJoined { .. } => EVENT_PEER_JOINED,
            Self::PeerLeft { .. } => EVENT_PEER_LEFT,
            Self::Signal { .. } => EVENT_SIGNAL,
            Self::ChatMessage { .. } => EVENT_CHAT_MESSAGE,
        }
    }
}

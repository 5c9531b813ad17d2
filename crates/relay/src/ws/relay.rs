use crate::registry::RoomRegistry;
use chrono::{SecondsFormat, Utc};
use consult_common::protocol::signal::{ClientMessage, PeerSummary, ServerMessage};
use consult_common::types::{ConnectionId, Identity, RoomId};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

/// Why an inbound event produced no effect. Never reported to the sender.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EventDropped {
    #[error("event is missing a required field")]
    Malformed,
    #[error("signal target is not connected to the sender's room")]
    TargetNotFound,
    #[error("sender is not a member of any room")]
    NotAMember,
    #[error("chat message is blank")]
    BlankMessage,
    #[error("connection is not registered")]
    UnknownConnection,
}

impl EventDropped {
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::TargetNotFound => "target_not_found",
            Self::NotAMember => "not_a_member",
            Self::BlankMessage => "blank_message",
            Self::UnknownConnection => "unknown_connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub rooms: usize,
    pub connections: usize,
    pub joined_connections: usize,
}

#[derive(Debug, Default)]
struct RelayState {
    registry: RoomRegistry,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
}

impl RelayState {
    /// Enqueue onto one connection's outbound queue. A closed queue only
    /// affects that connection.
    fn send(&self, to: ConnectionId, message: ServerMessage) -> bool {
        self.connections.get(&to).is_some_and(|sender| sender.send(message).is_ok())
    }

    /// Shared cleanup for leave-room and disconnect: remove the connection
    /// from its room and tell the remaining members.
    fn depart(&mut self, connection_id: ConnectionId) -> Option<RoomId> {
        let room_id = self.registry.room_of(connection_id).cloned()?;
        if !self.registry.leave(&room_id, connection_id) {
            return None;
        }

        for peer in self.registry.member_ids_excluding(&room_id, connection_id) {
            self.send(peer, ServerMessage::PeerLeft { connection_id });
        }
        Some(room_id)
    }
}

/// Admits and evicts room members and routes signaling and chat traffic.
///
/// All registry mutations and their fan-out happen inside one critical
/// section, so every member observes room events in the same order.
#[derive(Debug, Default)]
pub struct SignalRelay {
    state: RwLock<RelayState>,
}

impl SignalRelay {
    /// Register a live transport. The returned queue already holds the
    /// `connected` frame.
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection_id = ConnectionId::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(ServerMessage::Connected { connection_id });
        self.state.write().await.connections.insert(connection_id, sender);
        (connection_id, receiver)
    }

    pub async fn handle(
        &self,
        connection_id: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), EventDropped> {
        match message {
            ClientMessage::JoinRoom { room_id, identity } => {
                self.join_room(connection_id, room_id, identity).await
            }
            ClientMessage::Signal { target_connection_id, payload } => {
                self.signal(connection_id, target_connection_id, payload).await
            }
            ClientMessage::ChatMessage { message } => {
                self.chat_message(connection_id, message).await
            }
            ClientMessage::LeaveRoom => self.leave_room(connection_id).await,
        }
    }

    pub async fn join_room(
        &self,
        connection_id: ConnectionId,
        room_id: Option<String>,
        identity: Option<serde_json::Value>,
    ) -> Result<(), EventDropped> {
        let room_id = room_id
            .as_deref()
            .and_then(|raw| RoomId::parse(raw).ok())
            .ok_or(EventDropped::Malformed)?;
        let identity = identity.and_then(Identity::new).ok_or(EventDropped::Malformed)?;

        let mut state = self.state.write().await;
        if !state.connections.contains_key(&connection_id) {
            return Err(EventDropped::UnknownConnection);
        }

        if let Some(previous) = state.registry.room_of(connection_id).cloned() {
            if previous != room_id {
                state.depart(connection_id);
                info!(connection_id = %connection_id, room_id = %previous, "left room to join another");
            }
        }

        let peers = state.registry.join(&room_id, connection_id, identity.clone());
        let recipients: Vec<ConnectionId> = peers.iter().map(|peer| peer.connection_id).collect();

        state.send(connection_id, ServerMessage::ExistingPeers { peers });
        for peer in recipients {
            state.send(
                peer,
                ServerMessage::PeerJoined { connection_id, identity: identity.clone() },
            );
        }

        info!(connection_id = %connection_id, room_id = %room_id, "joined room");
        Ok(())
    }

    pub async fn signal(
        &self,
        from: ConnectionId,
        target_connection_id: Option<String>,
        payload: Option<serde_json::Value>,
    ) -> Result<(), EventDropped> {
        let target = target_connection_id
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(EventDropped::Malformed)?;
        let payload = payload.ok_or(EventDropped::Malformed)?;
        let target = ConnectionId::parse(&target).map_err(|_| EventDropped::TargetNotFound)?;

        let state = self.state.write().await;
        let room_id = state.registry.room_of(from).ok_or(EventDropped::NotAMember)?;
        if state.registry.room_of(target) != Some(room_id) {
            return Err(EventDropped::TargetNotFound);
        }
        if !state.send(target, ServerMessage::Signal { from, payload }) {
            return Err(EventDropped::TargetNotFound);
        }

        Ok(())
    }

    pub async fn chat_message(
        &self,
        from: ConnectionId,
        message: Option<String>,
    ) -> Result<(), EventDropped> {
        let message = message.ok_or(EventDropped::Malformed)?;
        let text = message.trim();
        if text.is_empty() {
            return Err(EventDropped::BlankMessage);
        }

        let state = self.state.write().await;
        let room_id = state.registry.room_of(from).ok_or(EventDropped::NotAMember)?;
        let sender =
            state.registry.identity_of(room_id, from).cloned().ok_or(EventDropped::NotAMember)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        for peer in state.registry.member_ids_excluding(room_id, from) {
            state.send(
                peer,
                ServerMessage::ChatMessage {
                    sender: sender.clone(),
                    message: text.to_string(),
                    timestamp: timestamp.clone(),
                },
            );
        }

        Ok(())
    }

    pub async fn leave_room(&self, connection_id: ConnectionId) -> Result<(), EventDropped> {
        let room_id = self.state.write().await.depart(connection_id).ok_or(EventDropped::NotAMember)?;
        info!(connection_id = %connection_id, room_id = %room_id, "left room");
        Ok(())
    }

    /// Transport went away: same cleanup as leave-room, then forget the
    /// connection. Safe to call more than once.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.state.write().await;
        let departed = state.depart(connection_id);
        let was_connected = state.connections.remove(&connection_id).is_some();
        drop(state);

        if let Some(room_id) = departed {
            info!(connection_id = %connection_id, room_id = %room_id, "disconnected from room");
        } else if was_connected {
            info!(connection_id = %connection_id, "disconnected");
        }
    }

    pub async fn members(&self, room_id: &RoomId) -> Vec<PeerSummary> {
        self.state.read().await.registry.members(room_id)
    }

    pub async fn room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.state.read().await.registry.room_of(connection_id).cloned()
    }

    pub async fn stats(&self) -> RelayStats {
        let state = self.state.read().await;
        RelayStats {
            rooms: state.registry.room_count(),
            connections: state.connections.len(),
            joined_connections: state.registry.member_count(),
        }
    }
}

// Room membership (who is in which room right now).

use consult_common::protocol::signal::PeerSummary;
use consult_common::types::{ConnectionId, Identity, RoomId};
use std::collections::HashMap;

/// Maps each room to its current members and their identity descriptors.
///
/// A room exists only while it has at least one member, and a connection is
/// a member of at most one room. Not synchronized: the owner serializes all
/// access.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, HashMap<ConnectionId, Identity>>,
    memberships: HashMap<ConnectionId, RoomId>,
}

impl RoomRegistry {
    /// Insert `connection_id` into `room_id`, returning the members that were
    /// present before the insert (never including the joiner itself).
    ///
    /// Re-joining the same room replaces the stored identity. Joining a
    /// different room first removes the connection from its previous room;
    /// callers that need to announce that departure do so via [`leave`]
    /// before calling `join`.
    ///
    /// [`leave`]: RoomRegistry::leave
    pub fn join(
        &mut self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> Vec<PeerSummary> {
        if let Some(previous) = self.room_of(connection_id).cloned() {
            if &previous != room_id {
                self.leave(&previous, connection_id);
            }
        }

        let members = self.rooms.entry(room_id.clone()).or_default();
        let existing = members
            .iter()
            .filter(|(member_id, _)| **member_id != connection_id)
            .map(|(member_id, identity)| PeerSummary {
                connection_id: *member_id,
                identity: identity.clone(),
            })
            .collect();

        members.insert(connection_id, identity);
        self.memberships.insert(connection_id, room_id.clone());
        existing
    }

    /// Remove `connection_id` from `room_id`. Returns false when it was not a
    /// member. Deletes the room once its last member leaves.
    pub fn leave(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };
        if members.remove(&connection_id).is_none() {
            return false;
        }
        if members.is_empty() {
            self.rooms.remove(room_id);
        }
        if self.memberships.get(&connection_id) == Some(room_id) {
            self.memberships.remove(&connection_id);
        }
        true
    }

    /// Current members of a room; empty when the room does not exist.
    pub fn members(&self, room_id: &RoomId) -> Vec<PeerSummary> {
        self.rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(connection_id, identity)| PeerSummary {
                        connection_id: *connection_id,
                        identity: identity.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Member ids of a room other than `exclude`.
    pub fn member_ids_excluding(
        &self,
        room_id: &RoomId,
        exclude: ConnectionId,
    ) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|members| members.keys().copied().filter(|id| *id != exclude).collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&RoomId> {
        self.memberships.get(&connection_id)
    }

    pub fn identity_of(&self, room_id: &RoomId, connection_id: ConnectionId) -> Option<&Identity> {
        self.rooms.get(room_id).and_then(|members| members.get(&connection_id))
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total members across all rooms.
    pub fn member_count(&self) -> usize {
        self.memberships.len()
    }
}

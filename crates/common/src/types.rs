// Core domain identifiers shared by the relay and its clients.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum allowed room identifier length in characters.
const MAX_ROOM_ID_CHARS: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("room id is empty")]
    EmptyRoomId,

    #[error("room id exceeds maximum length of {MAX_ROOM_ID_CHARS} characters")]
    RoomIdTooLong,

    #[error("invalid connection id: {0}")]
    InvalidConnectionId(String),
}

/// Opaque identifier of one live transport session.
///
/// Assigned at connect time, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| TypeError::InvalidConnectionId(raw.to_string()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ConnectionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Session identifier naming a room. Stored verbatim, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Validate a caller-supplied room id.
    ///
    /// Rejects empty / whitespace-only ids and ids longer than 256 characters.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        if raw.trim().is_empty() {
            return Err(TypeError::EmptyRoomId);
        }
        if raw.chars().count() > MAX_ROOM_ID_CHARS {
            return Err(TypeError::RoomIdTooLong);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied identity descriptor, passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(serde_json::Value);

impl Identity {
    /// Wrap a descriptor. Returns `None` when the descriptor is absent:
    /// `null`, `""`, `{}` or `[]`.
    pub fn new(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        let absent = match &value {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        };
        (!absent).then_some(Self(value))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

use axum::extract::{Json, Path, State};
use consult_common::types::{ConnectionId, RoomId};
use serde::Serialize;
use serde_json::json;

use crate::error::{ErrorCode, RelayError};

use super::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RoomEnvelope {
    room_id: RoomId,
    member_count: usize,
    connection_ids: Vec<ConnectionId>,
}

// Identities stay on the signaling channel; only ids are listed here.
pub(super) async fn get_room(
    State(state): State<ApiState>,
    Path(raw_room_id): Path<String>,
) -> Result<Json<RoomEnvelope>, RelayError> {
    let room_id = RoomId::parse(&raw_room_id).map_err(|error| {
        RelayError::new(ErrorCode::ValidationFailed, error.to_string())
            .with_details(json!({ "field": "roomId" }))
    })?;

    let connection_ids: Vec<ConnectionId> = state
        .relay
        .members(&room_id)
        .await
        .into_iter()
        .map(|peer| peer.connection_id)
        .collect();

    Ok(Json(RoomEnvelope { room_id, member_count: connection_ids.len(), connection_ids }))
}

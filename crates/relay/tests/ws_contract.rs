use consult_common::protocol::signal::{
    ClientMessage, PeerSummary, ServerMessage, CURRENT_PROTOCOL_VERSION,
};
use consult_common::types::{ConnectionId, Identity};
use serde_json::{json, Value};

const RELAY_WS_HANDLER_SOURCE: &str = include_str!("../src/ws/handler.rs");
const RELAY_WS_RELAY_SOURCE: &str = include_str!("../src/ws/relay.rs");

#[test]
fn websocket_contract_frame_limit_matches_default() {
    let max_frame_bytes = parse_u64_const(RELAY_WS_HANDLER_SOURCE, "MAX_FRAME_BYTES");
    assert_eq!(max_frame_bytes, 262_144);
    assert!(RELAY_WS_HANDLER_SOURCE.contains("close_code::SIZE"));
}

#[test]
fn websocket_contract_has_no_heartbeat_or_error_frame() {
    assert!(!RELAY_WS_HANDLER_SOURCE.contains("HEARTBEAT"));
    assert!(!RELAY_WS_RELAY_SOURCE.contains("ServerMessage::Error"));
}

#[test]
fn websocket_contract_protocol_version_is_consult_signal_v1() {
    assert_eq!(CURRENT_PROTOCOL_VERSION, "consult-signal.v1");
}

#[test]
fn websocket_contract_server_shapes() {
    let connection_id = ConnectionId::new_v4();
    let identity = Identity::new(json!({ "name": "Ana" })).expect("identity is present");

    let samples = [
        (
            ServerMessage::Connected { connection_id },
            "connected",
            &["type", "connectionId"][..],
        ),
        (
            ServerMessage::ExistingPeers {
                peers: vec![PeerSummary { connection_id, identity: identity.clone() }],
            },
            "existing-peers",
            &["type", "peers"][..],
        ),
        (
            ServerMessage::PeerJoined { connection_id, identity: identity.clone() },
            "peer-joined",
            &["type", "connectionId", "identity"][..],
        ),
        (ServerMessage::PeerLeft { connection_id }, "peer-left", &["type", "connectionId"][..]),
        (
            ServerMessage::Signal { from: connection_id, payload: json!({ "sdp": "v=0" }) },
            "signal",
            &["type", "from", "payload"][..],
        ),
        (
            ServerMessage::ChatMessage {
                sender: identity,
                message: "hello".to_string(),
                timestamp: "2026-02-07T00:00:00.000Z".to_string(),
            },
            "chat-message",
            &["type", "sender", "message", "timestamp"][..],
        ),
    ];

    for (message, expected_type, expected_keys) in samples {
        let value = serde_json::to_value(message).expect("server message should serialize");
        assert_eq!(value["type"], expected_type);
        assert_eq!(
            object_keys(&value),
            sorted(expected_keys),
            "serialized `{expected_type}` frame has unexpected keys",
        );
    }
}

#[test]
fn websocket_contract_client_frames_decode_with_camel_case_fields() {
    let join: ClientMessage = serde_json::from_value(json!({
        "type": "join-room",
        "roomId": "apt-1",
        "identity": { "name": "Ana" },
    }))
    .expect("join-room should decode");
    assert_eq!(
        join,
        ClientMessage::JoinRoom {
            room_id: Some("apt-1".to_string()),
            identity: Some(json!({ "name": "Ana" })),
        }
    );

    let signal: ClientMessage = serde_json::from_value(json!({
        "type": "signal",
        "targetConnectionId": "c0ffee",
        "payload": { "candidate": "x" },
    }))
    .expect("signal should decode");
    assert!(matches!(
        signal,
        ClientMessage::Signal { target_connection_id: Some(ref target), payload: Some(_) }
            if target == "c0ffee"
    ));

    let leave: ClientMessage =
        serde_json::from_value(json!({ "type": "leave-room", "extra": true }))
            .expect("leave-room should tolerate extra fields");
    assert_eq!(leave, ClientMessage::LeaveRoom);
}

#[test]
fn websocket_contract_absent_client_fields_are_omitted() {
    let frame = ClientMessage::ChatMessage { message: None };
    let value = serde_json::to_value(frame).expect("chat-message should serialize");
    assert_eq!(object_keys(&value), vec!["type".to_string()]);
}

fn sorted(keys: &[&str]) -> Vec<String> {
    let mut keys = keys.iter().map(|key| key.to_string()).collect::<Vec<_>>();
    keys.sort();
    keys
}

fn object_keys(value: &Value) -> Vec<String> {
    let mut keys =
        value.as_object().expect("value should be an object").keys().cloned().collect::<Vec<_>>();
    keys.sort();
    keys
}

fn parse_u64_const(source: &str, name: &str) -> u64 {
    let needle = format!("const {name}:");
    let index = source.find(&needle).expect("constant must be declared");
    let line = source[index..].lines().next().expect("constant declaration line must exist");
    let raw_value = line
        .split('=')
        .nth(1)
        .expect("constant must have assignment")
        .trim()
        .trim_end_matches(';')
        .replace('_', "");
    raw_value
        .parse::<u64>()
        .unwrap_or_else(|error| panic!("failed to parse `{name}` from `{line}`: {error}"))
}

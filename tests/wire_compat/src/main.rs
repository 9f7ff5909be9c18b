fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use hotdesk_protocol::constants::MessageType;
    use hotdesk_protocol::messages;
    use hotdesk_protocol::{AuthenticatedUser, ChatMessage, Message, MessageKind};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture file as text.
    ///
    /// Envelopes carry a `RawValue` payload, which only deserializes from
    /// text, so fixtures are never parsed through `serde_json::Value` first.
    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let text = load_fixture(name);
        let fixture: serde_json::Value = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"));
        let parsed: T = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    // --- Envelope ---

    #[test]
    fn fixture_message_envelope() {
        let msg = roundtrip_test::<Message>("message_envelope.json");
        assert_eq!(msg.msg_type, MessageType::SendMessage);
        let req: messages::SendMessageRequest = msg.parse_payload().unwrap().unwrap();
        assert_eq!(req.room_id, "general");
    }

    #[test]
    fn fixture_error_envelope() {
        let msg = roundtrip_test::<Message>("error_envelope.json");
        assert_eq!(msg.msg_type, MessageType::Error);
        assert!(msg.payload.is_none());
        assert_eq!(msg.error.unwrap().code, 403);
    }

    #[test]
    fn unknown_event_type_is_tolerated() {
        let msg: Message =
            serde_json::from_str(r#"{"type":"room_archived","payload":{"roomId":"r1"}}"#).unwrap();
        assert_eq!(msg.msg_type, MessageType::Unknown);
        assert!(msg.id.is_empty());
    }

    // --- Handshake ---

    #[test]
    fn fixture_authenticate_request() {
        roundtrip_test::<messages::AuthenticateRequest>("authenticate_request.json");
    }

    #[test]
    fn fixture_authenticated_user() {
        let user = roundtrip_test::<AuthenticatedUser>("authenticated_user.json");
        assert_eq!(user.id, "u1");
        assert_eq!(user.role, "admin");
    }

    #[test]
    fn fixture_auth_error() {
        let err = roundtrip_test::<messages::AuthErrorResponse>("auth_error.json");
        assert_eq!(err.message, "jwt expired");
    }

    // --- Rooms and messages ---

    #[test]
    fn fixture_join_room_request() {
        roundtrip_test::<messages::JoinRoomRequest>("join_room_request.json");
        // Leave shares the join payload shape.
        roundtrip_test::<messages::LeaveRoomRequest>("join_room_request.json");
    }

    #[test]
    fn fixture_send_message_request() {
        let req = roundtrip_test::<messages::SendMessageRequest>("send_message_request.json");
        assert_eq!(req.message_type, MessageKind::File);
        assert_eq!(req.attachments.len(), 1);
        assert_eq!(req.attachments[0].mime_type, "application/pdf");
    }

    #[test]
    fn fixture_chat_message() {
        let msg = roundtrip_test::<ChatMessage>("chat_message.json");
        assert_eq!(msg.sender_id, "u1");
        assert!(msg.attachments.is_empty());
    }

    // --- Presence and typing ---

    #[test]
    fn fixture_user_status_update() {
        let update = roundtrip_test::<messages::UserStatusUpdate>("user_status_update.json");
        assert!(!update.is_online);
    }

    #[test]
    fn fixture_typing_request() {
        roundtrip_test::<messages::TypingRequest>("typing_request.json");
    }

    #[test]
    fn fixture_typing_indicator() {
        roundtrip_test::<messages::TypingIndicator>("typing_indicator.json");
    }

    // --- Disconnect ---

    #[test]
    fn fixture_disconnect_notice() {
        let notice = roundtrip_test::<messages::DisconnectNotice>("disconnect_notice.json");
        assert_eq!(notice.reason, "io server disconnect");
    }

    #[test]
    fn event_names_match_wire() {
        let cases = [
            (MessageType::Authenticate, "authenticate"),
            (MessageType::Authenticated, "authenticated"),
            (MessageType::AuthError, "auth_error"),
            (MessageType::JoinRoom, "join_room"),
            (MessageType::LeaveRoom, "leave_room"),
            (MessageType::Typing, "typing"),
            (MessageType::SendMessage, "send_message"),
            (MessageType::MessageSent, "message_sent"),
            (MessageType::NewMessage, "new_message"),
            (MessageType::UserStatusUpdate, "user_status_update"),
            (MessageType::UserTyping, "user_typing"),
            (MessageType::Disconnect, "disconnect"),
            (MessageType::Error, "error"),
        ];
        for (msg_type, name) in cases {
            assert_eq!(
                serde_json::to_value(&msg_type).unwrap(),
                serde_json::json!(name),
                "wire name for {msg_type:?}"
            );
        }
    }
}

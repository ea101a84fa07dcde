use super::*;

fn join(name: &str) -> IncomingEvent {
    IncomingEvent::Join {
        username: name.to_string(),
    }
}

fn message(name: &str, text: &str) -> IncomingEvent {
    IncomingEvent::Message {
        username: name.to_string(),
        text: text.to_string(),
    }
}

#[test]
fn test_join_sets_username_and_announces_to_all() {
    let mut conn = Connection::new(ConnectionId::new());

    let outbound = conn.handle_event(join("bob")).unwrap();

    assert_eq!(conn.username(), "bob");
    assert_eq!(outbound.exclude, None);
    assert_eq!(outbound.message.user, "system");
    assert_eq!(outbound.message.text, "bob joined");
}

#[test]
fn test_join_without_username_is_ignored() {
    let mut conn = Connection::new(ConnectionId::new());

    assert!(conn.handle_event(join("")).is_none());
    assert_eq!(conn.username(), "");
}

#[test]
fn test_message_excludes_sender() {
    let id = ConnectionId::new();
    let mut conn = Connection::new(id);

    let outbound = conn.handle_event(message("alice", "hi")).unwrap();

    assert_eq!(outbound.exclude, Some(id));
    assert_eq!(outbound.message.user, "alice");
    assert_eq!(outbound.message.text, "hi");
    assert!(outbound.message.time > 0);
}

#[test]
fn test_joined_name_overrides_event_username() {
    let mut conn = Connection::new(ConnectionId::new());
    conn.handle_event(join("carol"));

    let outbound = conn.handle_event(message("mallory", "hello")).unwrap();
    assert_eq!(outbound.message.user, "carol");

    // Stored name also fills in a missing event username
    let outbound = conn.handle_event(message("", "again")).unwrap();
    assert_eq!(outbound.message.user, "carol");
}

#[test]
fn test_incomplete_messages_are_dropped() {
    let mut conn = Connection::new(ConnectionId::new());

    assert!(conn.handle_event(message("", "")).is_none());
    assert!(conn.handle_event(message("", "text without name")).is_none());
    assert!(conn.handle_event(message("alice", "")).is_none());
}

#[test]
fn test_unknown_event_is_dropped() {
    let mut conn = Connection::new(ConnectionId::new());
    assert!(conn.handle_event(IncomingEvent::Unknown).is_none());
}

#[test]
fn test_handle_frame_decodes_text_and_binary() {
    let mut conn = Connection::new(ConnectionId::new());

    let text = Message::Text(r#"{"type":"join","username":"dave"}"#.to_string());
    let outbound = conn.handle_frame(&text).unwrap();
    assert_eq!(outbound.message.text, "dave joined");

    let binary = Message::Binary(br#"{"type":"message","text":"bin"}"#.to_vec());
    let outbound = conn.handle_frame(&binary).unwrap();
    assert_eq!(outbound.message.user, "dave");
    assert_eq!(outbound.message.text, "bin");
}

#[test]
fn test_handle_frame_skips_malformed_and_control_frames() {
    let mut conn = Connection::new(ConnectionId::new());

    assert!(conn.handle_frame(&Message::Text("{not json".to_string())).is_none());
    assert!(conn.handle_frame(&Message::Binary(vec![0, 159, 146, 150])).is_none());
    assert!(conn.handle_frame(&Message::Ping(vec![1, 2, 3])).is_none());
    assert!(conn.handle_frame(&Message::Pong(Vec::new())).is_none());
    assert_eq!(conn.username(), "");
}

#[test]
fn test_close_reason_display() {
    assert_eq!(CloseReason::PeerClosed.to_string(), "peer closed");
    assert_eq!(
        CloseReason::ReadError("reset".to_string()).to_string(),
        "read error: reset"
    );
}

#[test]
fn test_null_username_falls_back_to_joined_name() {
    let mut conn = Connection::new(ConnectionId::new());
    conn.handle_event(join("erin"));

    let frame = Message::Text(r#"{"type":"message","username":null,"text":"hi"}"#.to_string());
    let outbound = conn.handle_frame(&frame).unwrap();
    assert_eq!(outbound.message.user, "erin");
    assert_eq!(outbound.message.text, "hi");
}

use chyme_types::{AttachmentRef, ContactId, DateTime, Message, MessageId, MessageKind};

#[test]
fn test_datetime_micros_round_trip() {
    // Microsecond resolution is the wire unit; sub-microsecond precision is
    // not preserved, so round trip at the wire resolution.
    let stamp = DateTime::from_micros(DateTime::now().micros()).unwrap();
    let restored = DateTime::from_micros(stamp.micros()).expect("micros should round trip");
    assert_eq!(stamp, restored);
}

#[test]
fn test_datetime_ordering() {
    let earlier = DateTime::from_micros(1_000_000).unwrap();
    let later = DateTime::from_micros(2_000_000).unwrap();
    assert!(earlier < later);
}

#[test]
fn test_message_id_pending_to_confirmed() {
    let pending = MessageId::pending();
    assert!(pending.is_pending());
    let confirmed = MessageId::Confirmed(pending.uuid());
    assert!(!confirmed.is_pending());
    assert_eq!(pending.uuid(), confirmed.uuid());
}

#[test]
fn test_message_involves_unordered_pair() {
    let a = ContactId::generate();
    let b = ContactId::generate();
    let c = ContactId::generate();
    let message = Message {
        id: MessageId::confirmed(),
        sender_id: a,
        recipient_id: b,
        body: "hi".into(),
        attachment: None,
        kind: MessageKind::Text,
        read: false,
        created_at: DateTime::now(),
    };
    assert!(message.involves(a, b));
    assert!(message.involves(b, a));
    assert!(!message.involves(a, c));
}

#[test]
fn test_message_serde_round_trip() {
    let message = Message {
        id: MessageId::confirmed(),
        sender_id: ContactId::generate(),
        recipient_id: ContactId::generate(),
        body: "voice note".into(),
        attachment: Some(AttachmentRef::new("voice://clip-1")),
        kind: MessageKind::Voice,
        read: true,
        created_at: DateTime::from_micros(1_700_000_000_000_000).unwrap(),
    };
    let encoded = serde_json::to_string(&message).expect("serialize failed");
    let decoded: Message = serde_json::from_str(&encoded).expect("deserialize failed");
    assert_eq!(decoded.id, message.id);
    assert_eq!(decoded.body, message.body);
    assert_eq!(decoded.attachment, message.attachment);
    assert_eq!(decoded.kind, message.kind);
    assert_eq!(decoded.created_at, message.created_at);
}

use chrono::{DateTime, Utc};
use krrish::conversation::Conversation;
use krrish::storage::{ChatStorage, MAX_CONVERSATIONS};

fn storage() -> (tempfile::TempDir, ChatStorage) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let storage = ChatStorage::new(dir.path().join("history/chat-history.json"));
    (dir, storage)
}

#[test]
fn test_round_trip_preserves_order_and_timestamps() {
    let (_dir, storage) = storage();
    let mut conversation = Conversation::new("Hello! I'm Krrish.");
    for i in 0..5 {
        conversation.append_user(format!("Hey Krrish, question {i}"));
        conversation.append_assistant(format!("Answer {i}"));
    }
    storage.save_conversation(&conversation).unwrap();

    let loaded = storage.get_conversations();
    assert_eq!(loaded.len(), 1);
    let restored = &loaded[0];
    assert_eq!(restored, &conversation);

    let texts: Vec<&str> = restored.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts[1], "Hey Krrish, question 0");
    assert_eq!(texts[10], "Answer 4");

    // Timestamps come back as timestamps, in order
    let stamps: Vec<DateTime<Utc>> = restored.messages.iter().map(|m| m.created_at).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(restored.updated_at, conversation.updated_at);
}

#[test]
fn test_record_layout_on_disk() {
    let (_dir, storage) = storage();
    let mut conversation = Conversation::new("Hello!");
    conversation.append_user("what time is it");
    storage.save_conversation(&conversation).unwrap();

    let raw = std::fs::read_to_string(storage.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let record = &json[0];
    assert_eq!(record["title"], "what time is it");
    assert!(record["createdAt"].is_string());
    assert!(record["updatedAt"].is_string());
    assert_eq!(record["messages"][1]["isUser"], true);
    assert!(record["messages"][1]["timestamp"]
        .as_str()
        .unwrap()
        .parse::<DateTime<Utc>>()
        .is_ok());
}

#[test]
fn test_most_recent_first_and_capped() {
    let (_dir, storage) = storage();
    let mut ids = Vec::new();
    for i in 0..(MAX_CONVERSATIONS + 5) {
        let mut conversation = Conversation::new("Hello!");
        conversation.append_user(format!("question {i}"));
        storage.save_conversation(&conversation).unwrap();
        ids.push(conversation.id);
    }

    let loaded = storage.get_conversations();
    assert_eq!(loaded.len(), MAX_CONVERSATIONS);
    assert_eq!(&loaded[0].id, ids.last().unwrap());
    assert!(!loaded.iter().any(|c| c.id == ids[0]));
}

#[test]
fn test_update_replaces_in_place() {
    let (_dir, storage) = storage();
    let mut first = Conversation::new("Hello!");
    first.append_user("first");
    storage.save_conversation(&first).unwrap();
    let mut second = Conversation::new("Hello!");
    second.append_user("second");
    storage.save_conversation(&second).unwrap();

    first.append_assistant("reply");
    storage.save_conversation(&first).unwrap();

    let loaded = storage.get_conversations();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, second.id);
    assert_eq!(loaded[1].messages.len(), 3);

    storage.delete_conversation(&second.id).unwrap();
    assert_eq!(storage.get_conversations().len(), 1);
}

use planbot::transport::{
    Notification, NotificationKind, TASK_ITEM_ACTIONS, TaskAction,
};
use serde_json::{Value, json};

#[test]
fn test_task_item_payload_shape() {
    let notification = Notification {
        chat_id: 42,
        kind: NotificationKind::TaskItem,
        text: "• #7 备份 NAS 配置".to_string(),
        task_id: Some(7),
        actions: TASK_ITEM_ACTIONS.to_vec(),
    };

    let payload = serde_json::to_value(&notification).unwrap();
    assert_eq!(
        payload,
        json!({
            "chat_id": 42,
            "kind": "task-item",
            "text": "• #7 备份 NAS 配置",
            "task_id": 7,
            "actions": ["complete", "not-done", "cancel"],
        })
    );
}

#[test]
fn test_prompt_payload_omits_task_fields() {
    let notification = Notification {
        chat_id: 42,
        kind: NotificationKind::Prompt,
        text: "要不要录入「明天 + 一周内」的新计划？".to_string(),
        task_id: None,
        actions: Vec::new(),
    };

    let payload = serde_json::to_value(&notification).unwrap();
    let object = payload.as_object().unwrap();
    assert_eq!(object.get("kind"), Some(&Value::from("prompt")));
    // Empty button sets and absent task ids never reach the wire.
    assert!(!object.contains_key("task_id"));
    assert!(!object.contains_key("actions"));
}

#[test]
fn test_kind_names_are_kebab_case() {
    for (kind, expected) in [
        (NotificationKind::ReviewHeader, "review-header"),
        (NotificationKind::TaskItem, "task-item"),
        (NotificationKind::Digest, "digest"),
        (NotificationKind::Prompt, "prompt"),
        (NotificationKind::Makeup, "makeup"),
    ] {
        assert_eq!(serde_json::to_value(kind).unwrap(), json!(expected));
    }
    assert_eq!(
        serde_json::to_value(TaskAction::NotDone).unwrap(),
        json!("not-done")
    );
}

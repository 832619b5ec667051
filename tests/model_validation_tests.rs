use chrono::Utc;
use serde_json::{Value, json};
use todo_portal::{
    identity::Role,
    models::{SubscriptionResponseData, Todo, UpdateTodoRequest, UserCreatedData, UserTodosResponseData, WebhookEvent},
    response::ApiResponse,
};
use uuid::Uuid;

// --- Envelope shape ---

#[test]
fn test_success_envelope_omits_absent_fields() {
    let envelope = ApiResponse::<Value>::success("ok", None);
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({ "success": true, "message": "ok" })
    );

    let with_data = ApiResponse::success("Fetched", Some(json!({ "n": 1 })));
    let value = serde_json::to_value(&with_data).unwrap();
    assert_eq!(value["data"]["n"], 1);
    assert!(value.get("errors").is_none());
}

#[test]
fn test_error_envelope_keeps_only_structured_errors() {
    let structured = ApiResponse::<Value>::error("Bad", Some(json!({ "field": "title" })));
    assert_eq!(structured.errors, Some(json!({ "field": "title" })));

    let list = ApiResponse::<Value>::error("Bad", Some(json!(["a", "b"])));
    assert!(list.errors.is_some());

    for scalar in [Value::Null, json!("oops"), json!(42), json!(false)] {
        let envelope = ApiResponse::<Value>::error("Bad", Some(scalar));
        assert_eq!(envelope.errors, None);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({ "success": false, "message": "Bad" })
        );
    }
}

// --- Wire format ---

#[test]
fn test_todo_serializes_camel_case() {
    let todo = Todo {
        id: Uuid::nil(),
        title: "Write docs".to_string(),
        description: None,
        completed: false,
        user_id: "user_1".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let value = serde_json::to_value(&todo).unwrap();

    assert_eq!(value["userId"], "user_1");
    assert!(value.get("createdAt").is_some());
    assert!(value.get("updatedAt").is_some());
    assert!(value.get("user_id").is_none());
    assert_eq!(value["description"], Value::Null);
}

#[test]
fn test_listing_and_subscription_payload_keys() {
    let listing = UserTodosResponseData {
        todos: vec![],
        total_items: 3,
        current_page: 1,
        total_pages: 1,
    };
    assert_eq!(
        serde_json::to_value(&listing).unwrap(),
        json!({ "todos": [], "totalItems": 3, "currentPage": 1, "totalPages": 1 })
    );

    let subscription = SubscriptionResponseData {
        is_subscribed: false,
        subscription_ends_at: None,
    };
    assert_eq!(
        serde_json::to_value(&subscription).unwrap(),
        json!({ "isSubscribed": false, "subscriptionEndsAt": null })
    );
}

#[test]
fn test_partial_update_payload() {
    let changes: UpdateTodoRequest = serde_json::from_value(json!({ "completed": true })).unwrap();
    assert_eq!(changes.completed, Some(true));
    assert_eq!(changes.title, None);
    assert_eq!(changes.description, None);
}

// --- Identity payloads ---

#[test]
fn test_role_parsing_defaults_to_user() {
    assert_eq!(serde_json::from_value::<Role>(json!("admin")).unwrap(), Role::Admin);
    assert_eq!(serde_json::from_value::<Role>(json!("user")).unwrap(), Role::User);
    assert_eq!(serde_json::from_value::<Role>(json!("moderator")).unwrap(), Role::User);
    assert!(Role::Admin.is_admin());
    assert!(!Role::default().is_admin());
}

#[test]
fn test_webhook_event_and_primary_email() {
    let event: WebhookEvent = serde_json::from_value(json!({
        "type": "user.created",
        "object": "event",
        "data": {
            "id": "user_1",
            "email_addresses": [
                { "id": "idn_a", "email_address": "a@example.com" },
                { "id": "idn_b", "email_address": "b@example.com" }
            ],
            "primary_email_address_id": "idn_b"
        }
    }))
    .unwrap();
    assert_eq!(event.event_type, "user.created");

    let data: UserCreatedData = serde_json::from_value(event.data).unwrap();
    assert_eq!(data.primary_email(), Some("b@example.com"));

    let without_primary: UserCreatedData = serde_json::from_value(json!({
        "id": "user_2",
        "email_addresses": [{ "id": "idn_a", "email_address": "a@example.com" }],
        "primary_email_address_id": null
    }))
    .unwrap();
    assert_eq!(without_primary.primary_email(), None);
}

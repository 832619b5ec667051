use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Local mirror of an identity-provider account, stored in the `users` table.
/// The `id` is the identity provider's user id, so sessions and rows share a key.
/// Created by the `user.created` webhook; subscription fields are owned by this service.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: String,
    pub email: String,
    pub is_subscribed: bool,
    #[ts(type = "string | null")]
    pub subscription_ends_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Todo
///
/// A single item of a user's todo list (`todos` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    // FK to users.id (Owner).
    pub user_id: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the mirrored user row. Only the identity fields are supplied;
/// subscription state starts unsubscribed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewUser {
    pub id: String,
    pub email: String,
}

// --- Request Payloads (Input Schemas) ---

/// CreateTodoRequest
///
/// Input payload for `POST /api/todo`. `title` is optional at the type level so a missing
/// title is answered with the "Title is required" envelope rather than a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// UpdateTodoRequest
///
/// Partial update payload for `PATCH /api/todo/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateTodoRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

// --- Response Payloads (the `data` of the envelope) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TodoResponseData {
    pub todo: Todo,
}

/// UserTodosResponseData
///
/// One page of the caller's todos plus the totals the UI needs to render pagination.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserTodosResponseData {
    pub todos: Vec<Todo>,
    pub total_items: i64,
    pub current_page: u32,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SubscriptionResponseData {
    pub is_subscribed: bool,
    #[ts(type = "string | null")]
    pub subscription_ends_at: Option<DateTime<Utc>>,
}

// --- Identity Webhook Schemas ---

/// WebhookEvent
///
/// Envelope of an identity-provider webhook delivery. Only `type` is inspected before
/// dispatching; `data` is decoded per event type.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload of a `user.created` event. Field names follow the provider's snake_case wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreatedData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub primary_email_address_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

impl UserCreatedData {
    /// The address flagged as primary, if the provider sent one that is also in the list.
    pub fn primary_email(&self) -> Option<&str> {
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|email| email.id == primary_id)
            .map(|email| email.email_address.as_str())
    }
}

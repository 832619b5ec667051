#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use todo_portal::{
    AccessPolicy, AppConfig, AppState, MockIdentityProvider, SessionVerifier,
    auth::Claims,
    models::{NewUser, Todo, UpdateTodoRequest, User},
    repository::{Repository, StorageError},
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SESSION_SECRET: &str = "test-secret-value-1234567890";

// --- MOCK REPOSITORY IMPLEMENTATION ---

// In-memory stand-in for Postgres. Behaves like the real queries (ordering, search,
// missing rows) so handlers can be exercised end to end.
#[derive(Default)]
pub struct MockRepo {
    pub users: Mutex<Vec<User>>,
    pub todos: Mutex<Vec<Todo>>,
}

fn row_not_found() -> StorageError {
    StorageError::KnownRequest {
        code: "ROW_NOT_FOUND".to_string(),
        message: "no rows returned".to_string(),
    }
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().push(user);
        self
    }

    pub fn with_todos(self, todos: Vec<Todo>) -> Self {
        self.todos.lock().unwrap().extend(todos);
        self
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    pub fn todo(&self, id: Uuid) -> Option<Todo> {
        self.todos.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    pub fn todo_count(&self) -> usize {
        self.todos.lock().unwrap().len()
    }

    fn matching(&self, user_id: &str, search: &str) -> Vec<Todo> {
        let needle = search.to_lowercase();
        let mut todos: Vec<Todo> = self
            .todos
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        todos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        todos
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StorageError> {
        Ok(self.user(id))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.id == user.id || u.email == user.email) {
            return Err(StorageError::KnownRequest {
                code: "23505".to_string(),
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }
        let now = Utc::now();
        let created = User {
            id: user.id,
            email: user.email,
            is_subscribed: false,
            subscription_ends_at: None,
            created_at: now,
            updated_at: now,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn set_subscription(
        &self,
        id: &str,
        is_subscribed: bool,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<User, StorageError> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id).ok_or_else(row_not_found)?;
        user.is_subscribed = is_subscribed;
        user.subscription_ends_at = ends_at;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_todos(
        &self,
        user_id: &str,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Todo>, StorageError> {
        Ok(self
            .matching(user_id, search)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_todos(&self, user_id: &str, search: &str) -> Result<i64, StorageError> {
        Ok(self.matching(user_id, search).len() as i64)
    }

    async fn get_todo(&self, id: Uuid) -> Result<Option<Todo>, StorageError> {
        Ok(self.todo(id))
    }

    async fn create_todo(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
    ) -> Result<Todo, StorageError> {
        let now = Utc::now();
        let todo = Todo {
            id: Uuid::new_v4(),
            title,
            description,
            completed: false,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.todos.lock().unwrap().push(todo.clone());
        Ok(todo)
    }

    async fn update_todo(&self, id: Uuid, changes: UpdateTodoRequest) -> Result<Todo, StorageError> {
        let mut todos = self.todos.lock().unwrap();
        let todo = todos.iter_mut().find(|t| t.id == id).ok_or_else(row_not_found)?;
        if let Some(title) = changes.title {
            todo.title = title;
        }
        if let Some(description) = changes.description {
            todo.description = Some(description);
        }
        if let Some(completed) = changes.completed {
            todo.completed = completed;
        }
        todo.updated_at = Utc::now();
        Ok(todo.clone())
    }

    async fn delete_todo(&self, id: Uuid) -> Result<(), StorageError> {
        let mut todos = self.todos.lock().unwrap();
        let before = todos.len();
        todos.retain(|t| t.id != id);
        if todos.len() == before {
            return Err(row_not_found());
        }
        Ok(())
    }
}

// --- Fixtures ---

pub fn user(id: &str) -> User {
    let now = Utc::now();
    User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        is_subscribed: false,
        subscription_ends_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// A todo created `age_secs` seconds ago, so tests control the listing order.
pub fn todo(user_id: &str, title: &str, age_secs: i64) -> Todo {
    let created_at = Utc::now() - Duration::seconds(age_secs);
    Todo {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        completed: false,
        user_id: user_id.to_string(),
        created_at,
        updated_at: created_at,
    }
}

pub fn todos(user_id: &str, count: usize) -> Vec<Todo> {
    (0..count)
        .map(|i| todo(user_id, &format!("Todo {}", i), i as i64))
        .collect()
}

pub fn create_token(user_id: &str, exp_offset_secs: i64) -> String {
    create_token_with_secret(user_id, exp_offset_secs, TEST_SESSION_SECRET)
}

pub fn create_token_with_secret(user_id: &str, exp_offset_secs: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now as usize,
        exp: (now + exp_offset_secs) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn app_state(repo: Arc<MockRepo>, identity: MockIdentityProvider) -> AppState {
    AppState {
        repo,
        identity: Arc::new(identity),
        sessions: SessionVerifier::from_secret(TEST_SESSION_SECRET),
        access: AccessPolicy::default(),
        config: AppConfig::default(),
    }
}

// --- Request helpers ---

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = read_json(response).await;
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

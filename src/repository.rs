use crate::models::{NewUser, Todo, UpdateTodoRequest, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// StorageError
///
/// Classifies persistence faults the way the request wrapper needs them: faults the database
/// raised about the request itself, faults about data that does not fit the schema, and
/// everything else (pool, I/O, TLS, protocol).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{message}")]
    KnownRequest { code: String, message: String },
    #[error("{message}")]
    Validation { message: String },
    #[error(transparent)]
    Backend(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => StorageError::KnownRequest {
                code: db_err
                    .code()
                    .map(|code| code.into_owned())
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                message: db_err.message().to_string(),
            },
            sqlx::Error::RowNotFound => StorageError::KnownRequest {
                code: "ROW_NOT_FOUND".to_string(),
                message: "no rows returned by a query that expected to return at least one row"
                    .to_string(),
            },
            sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::Encode(_) => StorageError::Validation {
                message: err.to_string(),
            },
            other => StorageError::Backend(other),
        }
    }
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers never know
/// whether they talk to Postgres or to a test double.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: &str) -> Result<Option<User>, StorageError>;
    // Mirrors an identity-provider account. Fails with a known-request fault on duplicate ids.
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;
    async fn set_subscription(
        &self,
        id: &str,
        is_subscribed: bool,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<User, StorageError>;

    // --- Todos ---
    // Newest first. `search` is a case-insensitive substring of the title; "" matches everything.
    async fn list_todos(
        &self,
        user_id: &str,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Todo>, StorageError>;
    async fn count_todos(&self, user_id: &str, search: &str) -> Result<i64, StorageError>;
    async fn get_todo(&self, id: Uuid) -> Result<Option<Todo>, StorageError>;
    async fn create_todo(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
    ) -> Result<Todo, StorageError>;
    // Partial update: only `Some` fields are written.
    async fn update_todo(&self, id: Uuid, changes: UpdateTodoRequest) -> Result<Todo, StorageError>;
    async fn delete_todo(&self, id: Uuid) -> Result<(), StorageError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Escapes LIKE wildcards so the search term is matched literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, email, is_subscribed, subscription_ends_at, created_at, updated_at";
const TODO_COLUMNS: &str = "id, title, description, completed, user_id, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: &str) -> Result<Option<User>, StorageError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(user.email)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// set_subscription
    ///
    /// Writes both subscription fields in one statement so the flag and its expiry never
    /// disagree. Used for purchases and for lazily expiring a lapsed subscription.
    async fn set_subscription(
        &self,
        id: &str,
        is_subscribed: bool,
        ends_at: Option<DateTime<Utc>>,
    ) -> Result<User, StorageError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET is_subscribed = $2, subscription_ends_at = $3, updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(is_subscribed)
        .bind(ends_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn list_todos(
        &self,
        user_id: &str,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Todo>, StorageError> {
        let todos = sqlx::query_as::<_, Todo>(&format!(
            r#"SELECT {TODO_COLUMNS}
               FROM todos
               WHERE user_id = $1 AND title ILIKE $2
               ORDER BY created_at DESC
               LIMIT $3 OFFSET $4"#
        ))
        .bind(user_id)
        .bind(like_pattern(search))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(todos)
    }

    async fn count_todos(&self, user_id: &str, search: &str) -> Result<i64, StorageError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM todos WHERE user_id = $1 AND title ILIKE $2",
        )
        .bind(user_id)
        .bind(like_pattern(search))
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn get_todo(&self, id: Uuid) -> Result<Option<Todo>, StorageError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn create_todo(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
    ) -> Result<Todo, StorageError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            r#"INSERT INTO todos (id, title, description, user_id)
               VALUES ($1, $2, $3, $4)
               RETURNING {TODO_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(description)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    /// update_todo
    ///
    /// Uses `COALESCE` so `None` fields keep their stored value.
    async fn update_todo(&self, id: Uuid, changes: UpdateTodoRequest) -> Result<Todo, StorageError> {
        let todo = sqlx::query_as::<_, Todo>(&format!(
            r#"UPDATE todos
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   completed = COALESCE($4, completed),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {TODO_COLUMNS}"#
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.completed)
        .fetch_one(&self.pool)
        .await?;
        Ok(todo)
    }

    async fn delete_todo(&self, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }
}

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult},
    models::{
        CreateTodoRequest, NewUser, SubscriptionResponseData, TodoResponseData,
        UpdateTodoRequest, User, UserCreatedData, UserTodosResponseData, WebhookEvent,
    },
    response::{error_response, success_response},
    webhook::{WebhookHeaders, WebhookVerifier},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::Response,
};
use chrono::{Months, Utc};
use serde::Deserialize;
use uuid::Uuid;

pub const TODOS_PER_PAGE: i64 = 10;
pub const FREE_TIER_TODO_LIMIT: i64 = 5;
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

const USER_CREATED_EVENT: &str = "user.created";

// --- Filter Structs ---

/// TodoFilter
///
/// Query parameters of the todo listing (GET /api/todo).
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TodoFilter {
    /// 1-based page number. Defaults to 1; values below 1 are treated as 1.
    pub page: Option<u32>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

// --- Validation ---

fn validate_title(title: &str) -> Option<&'static str> {
    if title.is_empty() {
        Some("Title is required")
    } else if title.chars().count() > TITLE_MAX_CHARS {
        Some("Title must be less than 100 characters")
    } else {
        None
    }
}

fn validate_description(description: Option<&str>) -> Option<&'static str> {
    description
        .filter(|text| text.chars().count() > DESCRIPTION_MAX_CHARS)
        .map(|_| "Description must be less than 500 characters")
}

fn bad_request(message: &str) -> Response {
    error_response(message, StatusCode::BAD_REQUEST, None)
}

fn unauthorized() -> Response {
    error_response("Unauthorized", StatusCode::UNAUTHORIZED, None)
}

fn not_found(message: &str) -> Response {
    error_response(message, StatusCode::NOT_FOUND, None)
}

// --- Handlers ---

/// health
///
/// [Public Route] Liveness check for load balancers.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> Response {
    success_response("ok", None::<()>, StatusCode::OK)
}

/// get_todos
///
/// [Authenticated Route] Lists one page (10 items, newest first) of the caller's todos,
/// optionally filtered by a case-insensitive title substring.
#[utoipa::path(
    get,
    path = "/api/todo",
    params(TodoFilter),
    responses(
        (status = 200, description = "Todos fetched successfully", body = UserTodosResponseData),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_todos(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TodoFilter>,
) -> ApiResult<Response> {
    let page = filter.page.unwrap_or(1).max(1);
    let search = filter.search.unwrap_or_default();
    let offset = i64::from(page - 1) * TODOS_PER_PAGE;

    let todos = state
        .repo
        .list_todos(&id, &search, TODOS_PER_PAGE, offset)
        .await?;
    let total_items = state.repo.count_todos(&id, &search).await?;
    let total_pages = (total_items + TODOS_PER_PAGE - 1) / TODOS_PER_PAGE;

    Ok(success_response(
        "Todos fetched successfully",
        Some(UserTodosResponseData {
            todos,
            total_items,
            current_page: page,
            total_pages,
        }),
        StatusCode::OK,
    ))
}

/// create_todo
///
/// [Authenticated Route] Creates a todo for the caller.
///
/// *Quota*: callers without an active subscription may own at most
/// `FREE_TIER_TODO_LIMIT` todos; the next creation is answered with 403.
#[utoipa::path(
    post,
    path = "/api/todo",
    request_body = CreateTodoRequest,
    responses(
        (status = 200, description = "Todo created successfully", body = TodoResponseData),
        (status = 400, description = "Invalid title or description"),
        (status = 403, description = "Free-tier limit reached"),
        (status = 404, description = "User not found")
    )
)]
pub async fn create_todo(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateTodoRequest>,
) -> ApiResult<Response> {
    let Some(user) = state.repo.get_user(&id).await? else {
        return Ok(not_found("User not found"));
    };

    if !user.is_subscribed {
        let owned = state.repo.count_todos(&id, "").await?;
        if owned >= FREE_TIER_TODO_LIMIT {
            return Ok(error_response(
                format!(
                    "Free users can only create up to {} todos. Please subscribe to create more.",
                    FREE_TIER_TODO_LIMIT
                ),
                StatusCode::FORBIDDEN,
                None,
            ));
        }
    }

    let title = payload.title.unwrap_or_default();
    if let Some(message) = validate_title(&title) {
        return Ok(bad_request(message));
    }
    if let Some(message) = validate_description(payload.description.as_deref()) {
        return Ok(bad_request(message));
    }

    let todo = state
        .repo
        .create_todo(&id, title, payload.description)
        .await?;

    Ok(success_response(
        "Todo created successfully",
        Some(TodoResponseData { todo }),
        StatusCode::OK,
    ))
}

/// update_todo
///
/// [Authenticated Route] Partially updates one of the caller's todos.
///
/// *Ownership*: a todo owned by someone else is answered with 401 and left untouched.
#[utoipa::path(
    patch,
    path = "/api/todo/{id}",
    params(("id" = Uuid, Path, description = "Todo ID")),
    request_body = UpdateTodoRequest,
    responses(
        (status = 200, description = "Todo updated successfully", body = TodoResponseData),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn update_todo(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateTodoRequest>,
) -> ApiResult<Response> {
    let Some(todo) = state.repo.get_todo(id).await? else {
        return Ok(not_found("Todo not found"));
    };

    if todo.user_id != user_id {
        return Ok(unauthorized());
    }

    if let Some(message) = payload.title.as_deref().and_then(validate_title) {
        return Ok(bad_request(message));
    }
    if let Some(message) = validate_description(payload.description.as_deref()) {
        return Ok(bad_request(message));
    }

    let todo = state.repo.update_todo(id, payload).await?;

    Ok(success_response(
        "Todo updated successfully",
        Some(TodoResponseData { todo }),
        StatusCode::OK,
    ))
}

/// delete_todo
///
/// [Authenticated Route] Deletes one of the caller's todos. Same ownership rule as
/// `update_todo`.
#[utoipa::path(
    delete,
    path = "/api/todo/{id}",
    params(("id" = Uuid, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Todo deleted successfully"),
        (status = 401, description = "Not the owner"),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn delete_todo(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Response> {
    let Some(todo) = state.repo.get_todo(id).await? else {
        return Ok(not_found("Todo not found"));
    };

    if todo.user_id != user_id {
        return Ok(unauthorized());
    }

    state.repo.delete_todo(id).await?;

    Ok(success_response(
        "Todo deleted successfully",
        None::<()>,
        StatusCode::OK,
    ))
}

fn subscription_data(user: &User) -> SubscriptionResponseData {
    SubscriptionResponseData {
        is_subscribed: user.is_subscribed,
        subscription_ends_at: user.subscription_ends_at,
    }
}

/// purchase_subscription
///
/// [Authenticated Route] Activates the caller's subscription for one calendar month from now.
#[utoipa::path(
    post,
    path = "/api/subscription",
    responses(
        (status = 200, description = "Successfully purchased subscription", body = SubscriptionResponseData),
        (status = 404, description = "User not found")
    )
)]
pub async fn purchase_subscription(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    if state.repo.get_user(&id).await?.is_none() {
        return Ok(not_found("User not found"));
    }

    let ends_at = Utc::now() + Months::new(1);
    let user = state.repo.set_subscription(&id, true, Some(ends_at)).await?;

    Ok(success_response(
        "Successfully purchased subscription",
        Some(subscription_data(&user)),
        StatusCode::OK,
    ))
}

/// get_subscription
///
/// [Authenticated Route] Reports the caller's subscription status.
///
/// *Expiry*: a subscription whose end date has passed is switched off (flag cleared,
/// end date removed) before the status is returned.
#[utoipa::path(
    get,
    path = "/api/subscription",
    responses(
        (status = 200, description = "Subscription fetched successfully", body = SubscriptionResponseData),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_subscription(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let Some(mut user) = state.repo.get_user(&id).await? else {
        return Ok(not_found("User not found"));
    };

    let now = Utc::now();
    if user.subscription_ends_at.is_some_and(|ends_at| ends_at < now) {
        user = state.repo.set_subscription(&id, false, None).await?;
    }

    Ok(success_response(
        "Subscription fetched successfully",
        Some(subscription_data(&user)),
        StatusCode::OK,
    ))
}

/// register_webhook
///
/// [Public Route] Receives identity-provider webhooks and mirrors newly created users into
/// the local `users` table.
///
/// *Flow*: verify the signature over the raw body, accept only `user.created`, resolve the
/// primary email address, insert the user.
#[utoipa::path(
    post,
    path = "/api/webhook/register",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook processed successfully"),
        (status = 400, description = "Missing headers, bad signature or unsupported event"),
        (status = 500, description = "Webhook secret unset or user creation failed")
    )
)]
pub async fn register_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let Some(secret) = state.config.webhook_secret.as_deref() else {
        return Ok(error_response(
            "CLERK_WEBHOOK_SECRET is not set",
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
        ));
    };

    let Some(webhook_headers) = WebhookHeaders::from_headers(&headers) else {
        return Ok(bad_request("Missing svix headers"));
    };

    let verifier =
        WebhookVerifier::new(secret).map_err(|e| ApiError::internal("WebhookSecretError", e))?;

    if let Err(e) = verifier.verify(&webhook_headers, &body) {
        tracing::warn!(event_id = %webhook_headers.id, error = %e, "webhook verification failed");
        return Ok(bad_request("Error verifying webhook"));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)?;
    if event.event_type != USER_CREATED_EVENT {
        return Ok(bad_request("Invalid webhook type"));
    }

    let data: UserCreatedData = serde_json::from_value(event.data)?;

    tracing::info!(
        event_type = %event.event_type,
        user_id = %data.id,
        event_id = %webhook_headers.id,
        email = data.primary_email().unwrap_or_default(),
        timestamp = %webhook_headers.timestamp,
        "Webhook received"
    );

    let Some(email) = data.primary_email() else {
        return Ok(bad_request("Email address not found"));
    };

    let new_user = NewUser {
        id: data.id.clone(),
        email: email.to_string(),
    };

    if let Err(e) = state.repo.create_user(new_user).await {
        tracing::error!(user_id = %data.id, error = %e, "Error creating user in database");
        return Ok(error_response(
            "Error creating user in database",
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
        ));
    }

    Ok(success_response(
        "Webhook processed successfully",
        None::<()>,
        StatusCode::OK,
    ))
}

/// fallback
///
/// Answers any unmatched route with the standard envelope.
pub async fn fallback(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "no route matched");
    not_found("Route not found")
}

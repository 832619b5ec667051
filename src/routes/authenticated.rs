use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Authenticated Router Module
///
/// Todo management and subscription endpoints. The authorization middleware rejects
/// anonymous callers with 401 before any of these handlers runs; ownership of individual
/// todos is checked inside the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/todo?page=&search=
        // One page of the caller's todos, newest first.
        // POST /api/todo
        // Creates a todo, subject to the free-tier quota.
        .route(
            "/api/todo",
            get(handlers::get_todos).post(handlers::create_todo),
        )
        // PATCH/DELETE /api/todo/{id}
        // Owner-only partial update and removal.
        .route(
            "/api/todo/{id}",
            patch(handlers::update_todo).delete(handlers::delete_todo),
        )
        // GET/POST /api/subscription
        // Status (with lazy expiry) and purchase.
        .route(
            "/api/subscription",
            get(handlers::get_subscription).post(handlers::purchase_subscription),
        )
}

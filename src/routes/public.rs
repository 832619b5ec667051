use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. The webhook authenticates its caller by
/// signature instead.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        // Liveness check for load balancers.
        .route("/api/health", get(handlers::health))
        // POST /api/webhook/register
        // Identity-provider webhook; mirrors `user.created` events into the users table.
        .route("/api/webhook/register", post(handlers::register_webhook))
}

use std::{any::Any, time::Instant};

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::{ApiError, FailureReport};

/// wrap_api
///
/// Applies the request wrapper to every route of an API router: panics are turned into the
/// standard 500 envelope, and every invocation is timed and logged. Only matched routes are
/// wrapped (`route_layer`), so the authorization middleware's short-circuits are not.
pub fn wrap_api<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route_layer(CatchPanicLayer::custom(panic_response))
        .route_layer(middleware::from_fn(log_and_time))
}

/// log_and_time
///
/// Times the handler from entry to response and writes one structured line per request:
/// `info` on success, `error` with message, type and cause when the response carries a
/// `FailureReport`.
pub async fn log_and_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    let response_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = response.status().as_u16();

    match response.extensions().get::<FailureReport>() {
        Some(report) => tracing::error!(
            method = %method,
            url = %path,
            status,
            error = %report.message,
            error_type = %report.error_type,
            cause = report.cause.as_deref().unwrap_or(""),
            response_time_ms,
            "request failed"
        ),
        None => tracing::info!(
            method = %method,
            url = %path,
            status,
            response_time_ms,
            "request completed"
        ),
    }

    response
}

/// panic_response
///
/// Converts a caught handler panic into an internal `ApiError`, so a panic looks exactly
/// like any other unrecognized fault to the client and to the logs.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    };

    ApiError::Internal {
        message,
        kind: "Panic".into(),
        source: None,
    }
    .into_response()
}

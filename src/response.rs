use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ApiResponse
///
/// The uniform envelope returned by every API endpoint, regardless of which handler produced it
/// or why it failed. Clients can always rely on `success` and `message`; `data` and `errors`
/// are only serialized when present.
///
/// `success = true` never carries `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value, E = Value> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<E>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            errors: None,
        }
    }

    /// error
    ///
    /// Builds a failure envelope. `errors` is dropped unless it is a structured value
    /// (a JSON object or array); `null` and bare scalars never reach the client.
    pub fn error(message: impl Into<String>, errors: Option<Value>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: errors.filter(|value| value.is_object() || value.is_array()),
        }
    }
}

/// success_response
///
/// Serializes a success envelope with the given status (handlers pass `StatusCode::OK`
/// unless they have a reason not to).
pub fn success_response<T: Serialize>(
    message: impl Into<String>,
    data: Option<T>,
    status: StatusCode,
) -> Response {
    (status, Json(ApiResponse::success(message, data))).into_response()
}

/// error_response
///
/// Serializes a failure envelope. Used by handlers for business-rule rejections, by the
/// authorization middleware for 401/500 replies and by `ApiError` on the wrapper's error path.
pub fn error_response(
    message: impl Into<String>,
    status: StatusCode,
    errors: Option<Value>,
) -> Response {
    (status, Json(ApiResponse::<Value>::error(message, errors))).into_response()
}

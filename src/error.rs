use std::{borrow::Cow, error::Error as StdError};

use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{identity::IdentityError, repository::StorageError, response::error_response};

type BoxError = Box<dyn StdError + Send + Sync>;

/// ApiError
///
/// The closed set of faults a handler can raise instead of answering directly. The variant
/// order is the translation precedence used by the request wrapper: storage "known request"
/// faults first, then data validation, then malformed input, and everything else last.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The storage layer rejected the request itself (constraint violation, missing row).
    #[error("{message}")]
    KnownRequest { code: String, message: String },
    /// The data did not fit the schema (decode failures, bad path or query parameters).
    #[error("{message}")]
    InvalidData { message: String },
    /// The request body could not be parsed.
    #[error("{message}")]
    MalformedInput { message: String },
    #[error("{message}")]
    Internal {
        message: String,
        kind: Cow<'static, str>,
        #[source]
        source: Option<BoxError>,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Wraps an arbitrary failure as an internal error, keeping it as the source for logging.
    pub fn internal<E>(kind: impl Into<Cow<'static, str>>, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Internal {
            message: err.to_string(),
            kind: kind.into(),
            source: Some(Box::new(err)),
        }
    }

    pub fn error_type(&self) -> &str {
        match self {
            Self::KnownRequest { .. } => "StorageKnownRequestError",
            Self::InvalidData { .. } => "StorageValidationError",
            Self::MalformedInput { .. } => "MalformedInputError",
            Self::Internal { kind, .. } => kind.as_ref(),
        }
    }

    /// The status the request wrapper answers with for this fault.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::KnownRequest { .. } | Self::InvalidData { .. } | Self::MalformedInput { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn cause_chain(&self) -> Option<String> {
        let mut causes = Vec::new();
        let mut current = self.source();
        while let Some(err) = current {
            causes.push(err.to_string());
            current = err.source();
        }
        (!causes.is_empty()).then(|| causes.join(": "))
    }
}

/// FailureReport
///
/// Attached to the extensions of every response produced from a fault, so the request wrapper
/// can log what went wrong after the handler has already been turned into a response.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub message: String,
    pub error_type: String,
    pub cause: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let report = FailureReport {
            message: self.to_string(),
            error_type: self.error_type().to_string(),
            cause: self.cause_chain(),
        };

        let mut response = match &self {
            Self::KnownRequest { code, message } => error_response(
                "Database error",
                status,
                Some(json!({ "code": code, "message": message })),
            ),
            Self::InvalidData { message } => error_response(
                "Invalid data provided",
                status,
                Some(json!({ "message": message })),
            ),
            Self::MalformedInput { message } => error_response(
                "Invalid JSON in request body",
                status,
                Some(json!({ "message": message })),
            ),
            Self::Internal { message, kind, .. } => error_response(
                "Internal Server Error",
                status,
                Some(json!({ "message": message, "type": kind })),
            ),
        };

        response.extensions_mut().insert(report);
        response
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::KnownRequest { code, message } => Self::KnownRequest { code, message },
            StorageError::Validation { message } => Self::InvalidData { message },
            StorageError::Backend(source) => Self::internal("StorageBackendError", source),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        Self::internal("IdentityProviderError", err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedInput {
            message: rejection.body_text(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput {
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidData {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidData {
            message: rejection.body_text(),
        }
    }
}

// --- Extractors whose rejections flow through ApiError ---

/// JSON body extractor that answers malformed bodies with the standard envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

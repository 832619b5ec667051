use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    identity::Role,
    repository::RepositoryState,
    response::error_response,
};

/// Name of the cookie the identity provider's front-end SDK stores the session token in.
pub const SESSION_COOKIE: &str = "__session";
/// Development-only header that authenticates as an existing user (`APP_ENV=local`).
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// The subset of the session JWT payload this service validates.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the identity provider's user id.
    pub sub: String,
    /// Expiration Time (exp): validated on every request.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token is malformed, expired or signed by someone else. The caller is signed out.
    #[error("invalid session token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    /// The configured key cannot verify anything. This is a server fault, not a caller fault.
    #[error("session verification key is misconfigured")]
    Misconfigured(#[source] jsonwebtoken::errors::Error),
}

/// SessionVerifier
///
/// Verifies session tokens issued by the identity provider. A PEM public key selects RS256
/// (the provider's production setup); anything else is treated as an HS256 shared secret.
#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_rsa_pem(pem: &str) -> Result<Self, SessionError> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(SessionError::Misconfigured)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        Ok(Self { key, validation })
    }

    /// from_parts
    ///
    /// Builds a verifier from an already decoded key and a custom validation, e.g. for
    /// key types or claim checks the constructors above do not cover.
    pub fn from_parts(key: DecodingKey, validation: Validation) -> Self {
        Self { key, validation }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, SessionError> {
        if config.session_key.trim_start().starts_with("-----BEGIN") {
            Self::from_rsa_pem(&config.session_key)
        } else {
            Ok(Self::from_secret(&config.session_key))
        }
    }

    /// verify
    ///
    /// Decodes and validates a token. Key problems are reported as `Misconfigured` so the
    /// middleware can tell "signed out" apart from "cannot check anybody".
    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::MissingAlgorithm => SessionError::Misconfigured(err),
                _ => SessionError::InvalidToken(err),
            })
    }
}

/// session_token
///
/// Finds the caller's session token: an `Authorization: Bearer` header first (API clients),
/// then the session cookie (browser navigations).
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
            .map(|(_, value)| value)
    })
}

/// AuthUser
///
/// The resolved identity of a request. The authorization middleware attaches it to the
/// request extensions; handlers receive it through the extractor below. `role` is only
/// filled for page requests, where the middleware had to look it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub role: Option<Role>,
}

/// resolve_caller
///
/// Works out who is calling:
/// 1. Local Bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Session Token: bearer header or session cookie, verified against the configured key.
///
/// Returns `Ok(None)` for anonymous callers (including invalid or expired tokens) and
/// `Err` only when the verifier itself is unusable.
pub async fn resolve_caller<S>(headers: &HeaderMap, state: &S) -> Result<Option<AuthUser>, SessionError>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
    SessionVerifier: FromRef<S>,
{
    let config = AppConfig::from_ref(state);

    if config.env == Env::Local {
        if let Some(user_id) = headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            let repo = RepositoryState::from_ref(state);
            // The user must exist locally; otherwise fall through to the token flow.
            match repo.get_user(user_id).await {
                Ok(Some(user)) => {
                    return Ok(Some(AuthUser {
                        id: user.id,
                        role: None,
                    }));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("dev bypass lookup failed: {}", e),
            }
        }
    }

    let Some(token) = session_token(headers) else {
        return Ok(None);
    };

    let verifier = SessionVerifier::from_ref(state);
    match verifier.verify(token) {
        Ok(claims) => Ok(Some(AuthUser {
            id: claims.sub,
            role: None,
        })),
        Err(SessionError::InvalidToken(e)) => {
            tracing::debug!("rejected session token: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// AuthUser Extractor Implementation
///
/// Reads the identity attached by the authorization middleware. A handler can only run
/// without one if it was mounted outside the middleware, and then it answers 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| error_response("Unauthorized", StatusCode::UNAUTHORIZED, None))
    }
}

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";
/// Deliveries older or newer than this are rejected to limit replays.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook secret is not valid base64")]
    InvalidSecret(#[source] base64::DecodeError),
    #[error("webhook timestamp is not a unix timestamp")]
    InvalidTimestamp,
    #[error("webhook timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("no webhook signature matched")]
    NoMatchingSignature,
}

/// The three signature headers of a webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub id: String,
    pub timestamp: String,
    pub signature: String,
}

impl WebhookHeaders {
    /// Returns `None` unless all three headers are present and non-empty.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            id: get(ID_HEADER)?,
            timestamp: get(TIMESTAMP_HEADER)?,
            signature: get(SIGNATURE_HEADER)?,
        })
    }
}

/// WebhookVerifier
///
/// Authenticates identity-provider webhooks (Svix scheme). The signed content is
/// `"{id}.{timestamp}.{body}"`, MAC'd with HMAC-SHA256 under the decoded secret. The signature
/// header may carry several space-separated `v1,<base64>` entries (key rotation); any match wins.
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    /// Accepts the secret with or without its `whsec_` prefix.
    pub fn new(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .map_err(WebhookError::InvalidSecret)?;
        Ok(Self { key })
    }

    pub fn verify(&self, headers: &WebhookHeaders, payload: &[u8]) -> Result<(), WebhookError> {
        self.verify_at(headers, payload, chrono::Utc::now().timestamp())
    }

    /// verify_at
    ///
    /// Same as `verify` with an explicit "now", in unix seconds.
    pub fn verify_at(
        &self,
        headers: &WebhookHeaders,
        payload: &[u8],
        now: i64,
    ) -> Result<(), WebhookError> {
        let timestamp: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;

        // abs_diff cannot overflow on extreme header values.
        if now.abs_diff(timestamp) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        for candidate in headers.signature.split_whitespace() {
            let Some((version, encoded)) = candidate.split_once(',') else {
                continue;
            };
            if version != SIGNATURE_VERSION {
                continue;
            }
            let Ok(signature) = STANDARD.decode(encoded) else {
                continue;
            };
            // verify_slice compares in constant time.
            if self
                .mac(&headers.id, &headers.timestamp, payload)
                .verify_slice(&signature)
                .is_ok()
            {
                return Ok(());
            }
        }

        Err(WebhookError::NoMatchingSignature)
    }

    /// sign
    ///
    /// Produces a `v1,<base64>` signature entry for the given delivery.
    pub fn sign(&self, id: &str, timestamp: i64, payload: &[u8]) -> String {
        let digest = self
            .mac(id, &timestamp.to_string(), payload)
            .finalize()
            .into_bytes();
        format!("{},{}", SIGNATURE_VERSION, STANDARD.encode(digest))
    }

    fn mac(&self, id: &str, timestamp: &str, payload: &[u8]) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.trim().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// Role
///
/// The closed set of roles the identity provider can assign through user metadata.
/// Accounts without a role (or with one this service does not know) are plain users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

/// The slice of an identity-provider account this service cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub id: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider has no user {0}")]
    NotFound(String),
    #[error("identity provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

// 1. IdentityProvider Contract
/// IdentityProvider
///
/// Abstract contract for role lookups against the external identity service. Called once per
/// authenticated page request; results are never cached.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<IdentityUser, IdentityError>;
}

/// IdentityState
///
/// The concrete type used to share the identity provider across the application state.
pub type IdentityState = Arc<dyn IdentityProvider>;

// 2. The Real Implementation (Clerk Backend API)
/// ClerkIdentityClient
///
/// Talks to a Clerk-compatible Backend API: `GET {api_url}/users/{id}` authenticated with the
/// instance secret key. The role lives in the user's public metadata.
#[derive(Clone)]
pub struct ClerkIdentityClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct ClerkUser {
    id: String,
    #[serde(default)]
    public_metadata: PublicMetadata,
}

#[derive(Deserialize, Default)]
struct PublicMetadata {
    #[serde(default)]
    role: Option<Role>,
}

impl ClerkIdentityClient {
    pub fn new(api_url: &str, secret_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for ClerkIdentityClient {
    async fn get_user(&self, id: &str) -> Result<IdentityUser, IdentityError> {
        let response = self
            .http
            .get(format!("{}/users/{}", self.api_url, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IdentityError::NotFound(id.to_string()));
        }

        let user = response.error_for_status()?.json::<ClerkUser>().await?;

        Ok(IdentityUser {
            id: user.id,
            role: user.public_metadata.role.unwrap_or_default(),
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockIdentityProvider
///
/// In-memory provider used by tests and local tooling. Unknown ids are reported as
/// `NotFound`; `should_fail` simulates an outage for every lookup.
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    pub roles: HashMap<String, Role>,
    pub should_fail: bool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            roles: HashMap::new(),
            should_fail: true,
        }
    }

    pub fn with_user(mut self, id: &str, role: Role) -> Self {
        self.roles.insert(id.to_string(), role);
        self
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn get_user(&self, id: &str) -> Result<IdentityUser, IdentityError> {
        if self.should_fail {
            return Err(IdentityError::Unavailable(
                "Mock Identity Error: Simulation requested".to_string(),
            ));
        }

        self.roles
            .get(id)
            .map(|role| IdentityUser {
                id: id.to_string(),
                role: *role,
            })
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }
}

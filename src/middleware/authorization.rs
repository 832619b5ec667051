use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{AppState, auth::resolve_caller, identity::Role, response::error_response};

/// RoutePattern
///
/// A path matcher in the route-config notation: `/sign-in` matches that path exactly
/// (ignoring a trailing slash), `/admin(.*)` matches every path starting with `/admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    Exact(String),
    Prefix(String),
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("(.*)") {
            Some(stem) => RoutePattern::Prefix(stem.to_string()),
            None => RoutePattern::Exact(normalize(pattern).to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => normalize(path) == exact,
            RoutePattern::Prefix(stem) => path.starts_with(stem.as_str()),
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn patterns(list: &[&str]) -> Vec<RoutePattern> {
    list.iter().map(|pattern| RoutePattern::parse(pattern)).collect()
}

fn matches_any(patterns: &[RoutePattern], path: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(path))
}

/// Every request path falls in exactly one of these buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    PublicPage,
    PublicApi,
    AdminOnly,
    ProtectedPage,
    ProtectedApi,
}

/// Caller
///
/// What the middleware knows about the caller when it decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    /// Signed in, but the role is unknown: it is not looked up for API requests, and a
    /// failed lookup on a page request lands here too.
    Unresolved,
    WithRole(Role),
}

/// The single outcome of evaluating a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
    Reject,
}

/// AccessPolicy
///
/// The fixed route configuration the authorization middleware evaluates against.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub public_pages: Vec<RoutePattern>,
    pub public_api: Vec<RoutePattern>,
    pub admin_only: Vec<RoutePattern>,
    /// Paths the middleware never evaluates (static assets, API docs).
    pub exempt: Vec<RoutePattern>,
    pub exempt_extensions: Vec<String>,
    pub sign_in: String,
    pub dashboard: String,
    pub admin_dashboard: String,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            public_pages: patterns(&["/sign-in", "/sign-up", "/"]),
            public_api: patterns(&["/api/webhook/register", "/api/health"]),
            admin_only: patterns(&["/admin(.*)"]),
            exempt: patterns(&["/favicon.ico", "/swagger-ui(.*)", "/api-docs(.*)"]),
            exempt_extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            sign_in: "/sign-in".to_string(),
            dashboard: "/dashboard".to_string(),
            admin_dashboard: "/admin/dashboard".to_string(),
        }
    }
}

impl AccessPolicy {
    pub fn is_exempt(&self, path: &str) -> bool {
        let has_static_extension = path
            .rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .is_some_and(|(_, ext)| {
                self.exempt_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            });
        has_static_extension || matches_any(&self.exempt, path)
    }

    pub fn is_api(&self, path: &str) -> bool {
        path.starts_with("/api")
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.is_api(path) {
            if matches_any(&self.public_api, path) {
                RouteClass::PublicApi
            } else {
                RouteClass::ProtectedApi
            }
        } else if matches_any(&self.public_pages, path) {
            RouteClass::PublicPage
        } else if matches_any(&self.admin_only, path) {
            RouteClass::AdminOnly
        } else {
            RouteClass::ProtectedPage
        }
    }

    /// The landing page for a signed-in role.
    pub fn home_for(&self, role: Role) -> &str {
        if role.is_admin() {
            &self.admin_dashboard
        } else {
            &self.dashboard
        }
    }

    /// decide
    ///
    /// The whole authorization table as a pure function of path and caller:
    /// - API: public API passes; anything else passes only for a signed-in caller (401 otherwise).
    /// - Pages, known role: admins on the plain dashboard go to the admin dashboard, non-admins
    ///   on admin-only paths go to the dashboard, public pages bounce to the role's dashboard.
    /// - Pages, anonymous or unresolved role: public pages pass, everything else goes to sign-in.
    pub fn decide(&self, path: &str, caller: Caller) -> Decision {
        match self.classify(path) {
            RouteClass::PublicApi => Decision::Allow,
            RouteClass::ProtectedApi => match caller {
                Caller::Anonymous => Decision::Reject,
                Caller::Unresolved | Caller::WithRole(_) => Decision::Allow,
            },
            class => match caller {
                Caller::WithRole(role) => self.decide_for_role(path, class, role),
                Caller::Anonymous | Caller::Unresolved => match class {
                    RouteClass::PublicPage => Decision::Allow,
                    _ => Decision::Redirect(self.sign_in.clone()),
                },
            },
        }
    }

    fn decide_for_role(&self, path: &str, class: RouteClass, role: Role) -> Decision {
        if role.is_admin() && normalize(path) == self.dashboard {
            return Decision::Redirect(self.admin_dashboard.clone());
        }

        match class {
            RouteClass::AdminOnly if !role.is_admin() => Decision::Redirect(self.dashboard.clone()),
            RouteClass::PublicPage => Decision::Redirect(self.home_for(role).to_string()),
            _ => Decision::Allow,
        }
    }

    /// The answer when the middleware itself cannot evaluate the request.
    fn failure_response(&self, is_api: bool) -> Response {
        if is_api {
            error_response(
                "Internal server error",
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
            )
        } else {
            Redirect::temporary(&self.sign_in).into_response()
        }
    }
}

/// authorize
///
/// Runs before every request. Resolves the caller, looks up the role for page requests,
/// then either passes the request on (with the `AuthUser` attached), redirects, or answers
/// 401. A request without identity never reaches a protected handler.
pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let policy = &state.access;
    let path = request.uri().path().to_owned();

    if policy.is_exempt(&path) {
        return next.run(request).await;
    }

    let is_api = policy.is_api(&path);

    let headers = request.headers().clone();
    let caller = match resolve_caller(&headers, &state).await {
        Ok(caller) => caller,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Middleware error");
            return policy.failure_response(is_api);
        }
    };

    let (decision, role) = match &caller {
        None => (policy.decide(&path, Caller::Anonymous), None),
        Some(_) if is_api => (policy.decide(&path, Caller::Unresolved), None),
        Some(user) => match state.identity.get_user(&user.id).await {
            Ok(identity) => (
                policy.decide(&path, Caller::WithRole(identity.role)),
                Some(identity.role),
            ),
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to fetch user data");
                (policy.decide(&path, Caller::Unresolved), None)
            }
        },
    };

    tracing::debug!(
        path = %path,
        class = ?policy.classify(&path),
        decision = ?decision,
        "authorization decided"
    );

    match decision {
        Decision::Allow => {
            if let Some(mut user) = caller {
                user.role = role;
                request.extensions_mut().insert(user);
            }
            next.run(request).await
        }
        Decision::Redirect(target) => Redirect::temporary(&target).into_response(),
        Decision::Reject => error_response("Unauthorized", StatusCode::UNAUTHORIZED, None),
    }
}

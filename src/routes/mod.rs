/// Router Module Index
///
/// Splits the API into the two access classes the authorization middleware knows about.
/// Access control itself is applied once, in front of every route, by
/// `middleware::authorize`; these modules only decide which handler serves which path.

/// Routes the middleware lets through without a session (health check, identity webhook).
pub mod public;

/// Routes that require a signed-in caller. Handlers receive the caller as `AuthUser`.
pub mod authenticated;

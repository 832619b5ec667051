//! Request lifecycle middleware.
//!
//! Route authorization runs first on every request; the request wrapper runs around every
//! matched API handler.

pub mod authorization;
pub mod request_wrapper;

pub use authorization::{AccessPolicy, Caller, Decision, RouteClass, RoutePattern, authorize};
pub use request_wrapper::{log_and_time, wrap_api};

//! HTTP handlers in front of the session manager

pub mod auth;
pub mod requests;

pub use auth::{auth_routes, ProblemDetails};
pub use requests::{SignInRequest, SignUpRequest};

//! AuthMe - credential verification and access/refresh token issuance
//!
//! This library verifies user credentials, issues signed access/refresh
//! token pairs and records them in a token cache for revocation.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod security;
pub mod security_logger;
pub mod storage;

// Re-export main components
pub use auth::{AuthResult, SessionManager};
pub use config::*;
pub use constants::*;

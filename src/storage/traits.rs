//! Abstract storage interfaces for pluggable backends
//!
//! The engine never owns user records or the issued-token registry. Both live
//! behind these traits so that many engine instances can share them.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::user::{Claim, UserIdentity};
use crate::error::Result;

/// Outcome of asking the user store to create an account
#[derive(Debug, Clone)]
pub enum ProvisioningResult {
    Created(UserIdentity),
    /// Rejected by the store (duplicate email, weak password...), with its reasons
    Rejected(Vec<String>),
}

/// User store interface
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user with the given credentials
    async fn create_user(&self, email: &str, password: &str) -> Result<ProvisioningResult>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserIdentity>>;

    /// Check a password against the stored hash. A mismatch counts as a failed
    /// attempt and may lock the account.
    async fn check_password(&self, user: &UserIdentity, password: &str) -> Result<bool>;

    async fn is_locked_out(&self, user: &UserIdentity) -> Result<bool>;

    async fn is_email_confirmed(&self, user: &UserIdentity) -> Result<bool>;

    async fn set_lockout_enabled(&self, user: &UserIdentity, enabled: bool) -> Result<()>;

    async fn get_claims(&self, user: &UserIdentity) -> Result<Vec<Claim>>;

    async fn get_roles(&self, user: &UserIdentity) -> Result<Vec<String>>;
}

/// Key/value store with per-entry TTL recording issued tokens
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Store `value` under `key` for `ttl`, indexed under `subject_id`
    async fn set(&self, subject_id: &str, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove a single entry; missing keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry recorded for the subject and return how many were removed
    async fn delete_by_subject(&self, subject_id: &str) -> Result<usize>;
}

/// Shared reference to a user store
pub type SharedUserStore = Arc<dyn UserStore>;

/// Shared reference to a token cache
pub type SharedTokenCache = Arc<dyn TokenCache>;

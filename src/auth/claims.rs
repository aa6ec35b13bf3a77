//! Claim sets carried by access and refresh tokens
//!
//! Canonical order of a claim set: `sub`, `email`, `jti`, `nbf`, `iat`, then
//! custom claims sorted by name and value, then one `role` entry per role name
//! sorted alphabetically. Refresh tokens stop after `iat`.

use chrono::Utc;

use crate::auth::user::{Claim, UserIdentity};
use crate::error::Result;
use crate::storage::traits::UserStore;

/// Claim name used for role entries
pub const ROLE_CLAIM: &str = "role";

/// Names the token format owns; custom claims may not reuse them
pub const RESERVED_CLAIM_NAMES: [&str; 9] =
    ["sub", "email", "jti", "nbf", "iat", "exp", "iss", "aud", ROLE_CLAIM];

/// Claims embedded in a single token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    /// Subject (user ID)
    pub subject: String,
    pub email: String,
    /// Unique token identifier
    pub jti: String,
    /// Not before (UTC seconds)
    pub not_before: i64,
    /// Issued at (UTC seconds)
    pub issued_at: i64,
    /// Custom claims, canonical order
    pub user_claims: Vec<Claim>,
    /// Role names, canonical order
    pub roles: Vec<String>,
}

impl ClaimSet {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// True when the set carries no roles and no custom claims (refresh tokens)
    pub fn is_minimal(&self) -> bool {
        self.user_claims.is_empty() && self.roles.is_empty()
    }

    /// Flatten into name/value pairs in canonical order
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            ("sub".to_string(), self.subject.clone()),
            ("email".to_string(), self.email.clone()),
            ("jti".to_string(), self.jti.clone()),
            ("nbf".to_string(), self.not_before.to_string()),
            ("iat".to_string(), self.issued_at.to_string()),
        ];
        entries.extend(
            self.user_claims
                .iter()
                .map(|claim| (claim.name.clone(), claim.value.clone())),
        );
        entries.extend(
            self.roles
                .iter()
                .map(|role| (ROLE_CLAIM.to_string(), role.clone())),
        );
        entries
    }
}

/// Sort and deduplicate custom claims, dropping any that would shadow a registered claim
pub fn canonical_claims(claims: Vec<Claim>) -> Vec<Claim> {
    let mut claims: Vec<Claim> = claims
        .into_iter()
        .filter(|claim| {
            let reserved = RESERVED_CLAIM_NAMES.contains(&claim.name.as_str());
            if reserved {
                log::warn!("Ignoring custom claim with reserved name '{}'", claim.name);
            }
            !reserved
        })
        .collect();
    claims.sort();
    claims.dedup();
    claims
}

/// Sort and deduplicate role names
pub fn canonical_roles(roles: Vec<String>) -> Vec<String> {
    let mut roles = roles;
    roles.sort();
    roles.dedup();
    roles
}

/// Assembles claim sets, reading custom claims and roles from the user store
pub struct ClaimsBuilder<'a> {
    users: &'a dyn UserStore,
}

impl<'a> ClaimsBuilder<'a> {
    pub fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    /// Build a fresh claim set. Only `jti` and the timestamps differ between
    /// two calls for the same user and flag.
    pub async fn build(&self, user: &UserIdentity, include_user_claims: bool) -> Result<ClaimSet> {
        let now = Utc::now().timestamp();

        let (user_claims, roles) = if include_user_claims {
            let claims = self.users.get_claims(user).await?;
            let roles = self.users.get_roles(user).await?;
            (canonical_claims(claims), canonical_roles(roles))
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(ClaimSet {
            subject: user.id.clone(),
            email: user.email.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            not_before: now,
            issued_at: now,
            user_claims,
            roles,
        })
    }
}

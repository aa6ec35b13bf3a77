use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A name/value fact attached to a user and copied into access tokens
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
}

impl Claim {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// User record as held by the user store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Unique user identifier
    pub id: String,
    /// Login name (the email address for self-provisioned accounts)
    pub user_name: String,
    pub email: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_confirmed: bool,
    /// Whether failed attempts can lock this account
    pub lockout_enabled: bool,
    /// Account is locked until this instant (when lockout is enabled)
    pub lockout_end: Option<DateTime<Utc>>,
    pub access_failed_count: u32,
    pub two_factor_enabled: bool,
    /// Custom claims
    pub claims: Vec<Claim>,
    /// Role names
    pub roles: Vec<String>,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

impl UserIdentity {
    /// Creates a confirmed account for `email` with lockout enabled and no claims or roles
    pub fn new(email: impl Into<String>, password_hash: String) -> Self {
        let email = email.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: email.clone(),
            email,
            password_hash,
            email_confirmed: true,
            lockout_enabled: true,
            lockout_end: None,
            access_failed_count: 0,
            two_factor_enabled: false,
            claims: Vec::new(),
            roles: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Locked out only while lockout is enabled and the lockout end lies in the future
    pub fn is_locked_out_at(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.map_or(false, |end| end > now)
    }
}

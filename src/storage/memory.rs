//! In-memory storage implementation for development and testing
//!
//! Keeps user records and issued tokens in process memory. Suitable for
//! development, tests or a single-instance deployment; use a shared backend
//! when several service instances must see the same sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::traits::*;
use crate::auth::password::{hash_password, verify_password, PasswordPolicy};
use crate::auth::user::{Claim, UserIdentity};
use crate::constants::{DEFAULT_LOCKOUT_MINUTES, MAX_FAILED_ACCESS_ATTEMPTS};
use crate::error::{AuthMeError, Result};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory user store
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserIdentity>>>,
    by_email: Arc<RwLock<HashMap<String, String>>>, // normalized email -> user id
    policy: PasswordPolicy,
    max_failed_attempts: u32,
    lockout_duration: chrono::Duration,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::with_policy(PasswordPolicy::default())
    }

    pub fn with_policy(policy: PasswordPolicy) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            by_email: Arc::new(RwLock::new(HashMap::new())),
            policy,
            max_failed_attempts: MAX_FAILED_ACCESS_ATTEMPTS,
            lockout_duration: chrono::Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        }
    }

    async fn update<F>(&self, user_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut UserIdentity),
    {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(user) => {
                apply(user);
                Ok(())
            }
            None => Err(AuthMeError::NotFound(format!("User {} not found", user_id))),
        }
    }

    /// Attach a custom claim to a user
    pub async fn add_claim(&self, user_id: &str, claim: Claim) -> Result<()> {
        self.update(user_id, |user| {
            if !user.claims.contains(&claim) {
                user.claims.push(claim);
            }
        })
        .await
    }

    pub async fn add_to_role(&self, user_id: &str, role: &str) -> Result<()> {
        self.update(user_id, |user| {
            if !user.roles.iter().any(|r| r == role) {
                user.roles.push(role.to_string());
            }
        })
        .await
    }

    pub async fn set_email_confirmed(&self, user_id: &str, confirmed: bool) -> Result<()> {
        self.update(user_id, |user| user.email_confirmed = confirmed).await
    }

    /// Lock the account until `end` (or unlock with `None`). Has no effect while lockout is disabled.
    pub async fn set_lockout_end(&self, user_id: &str, end: Option<DateTime<Utc>>) -> Result<()> {
        self.update(user_id, |user| user.lockout_end = end).await
    }

    pub async fn set_two_factor_enabled(&self, user_id: &str, enabled: bool) -> Result<()> {
        self.update(user_id, |user| user.two_factor_enabled = enabled).await
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, email: &str, password: &str) -> Result<ProvisioningResult> {
        let normalized = normalize_email(email);
        let mut errors = Vec::new();

        if self.by_email.read().await.contains_key(&normalized) {
            errors.push(format!("Username '{}' is already taken.", email));
            errors.push(format!("Email '{}' is already taken.", email));
        }
        errors.extend(self.policy.violations(password));
        if !errors.is_empty() {
            return Ok(ProvisioningResult::Rejected(errors));
        }

        // Argon2 is deliberately slow; keep it off the async workers
        let owned = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&owned))
            .await
            .map_err(|e| AuthMeError::StorageError(format!("Hashing task failed: {}", e)))??;

        let user = UserIdentity::new(email.trim(), password_hash);

        let mut users = self.users.write().await;
        let mut by_email = self.by_email.write().await;
        // Another request may have registered the same address while we were hashing
        if by_email.contains_key(&normalized) {
            return Ok(ProvisioningResult::Rejected(vec![
                format!("Username '{}' is already taken.", email),
                format!("Email '{}' is already taken.", email),
            ]));
        }
        by_email.insert(normalized, user.id.clone());
        users.insert(user.id.clone(), user.clone());

        log::debug!("User {} created", user.id);
        Ok(ProvisioningResult::Created(user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>> {
        let user_id = self.by_email.read().await.get(&normalize_email(email)).cloned();
        match user_id {
            Some(id) => self.find_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserIdentity>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn check_password(&self, user: &UserIdentity, password: &str) -> Result<bool> {
        let password_hash = match self.users.read().await.get(&user.id) {
            Some(stored) => stored.password_hash.clone(),
            None => return Err(AuthMeError::NotFound(format!("User {} not found", user.id))),
        };
        let owned = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&owned, &password_hash))
            .await
            .map_err(|e| AuthMeError::StorageError(format!("Password check task failed: {}", e)))?;

        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| AuthMeError::NotFound(format!("User {} not found", user.id)))?;

        if matches {
            stored.access_failed_count = 0;
            return Ok(true);
        }

        if stored.lockout_enabled {
            stored.access_failed_count += 1;
            if stored.access_failed_count >= self.max_failed_attempts {
                stored.lockout_end = Some(Utc::now() + self.lockout_duration);
                stored.access_failed_count = 0;
                log::warn!("User {} locked out after repeated failed attempts", stored.id);
            }
        }
        Ok(false)
    }

    async fn is_locked_out(&self, user: &UserIdentity) -> Result<bool> {
        let users = self.users.read().await;
        let stored = users.get(&user.id).unwrap_or(user);
        Ok(stored.is_locked_out_at(Utc::now()))
    }

    async fn is_email_confirmed(&self, user: &UserIdentity) -> Result<bool> {
        let users = self.users.read().await;
        Ok(users.get(&user.id).unwrap_or(user).email_confirmed)
    }

    async fn set_lockout_enabled(&self, user: &UserIdentity, enabled: bool) -> Result<()> {
        self.update(&user.id, |stored| stored.lockout_enabled = enabled).await
    }

    async fn get_claims(&self, user: &UserIdentity) -> Result<Vec<Claim>> {
        let users = self.users.read().await;
        Ok(users.get(&user.id).unwrap_or(user).claims.clone())
    }

    async fn get_roles(&self, user: &UserIdentity) -> Result<Vec<String>> {
        let users = self.users.read().await;
        Ok(users.get(&user.id).unwrap_or(user).roles.clone())
    }
}

/// Cached token value with its deadline
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    subject_id: String,
    expires_at: Instant,
}

/// In-memory token cache with lazy expiry and a subject index
pub struct MemoryTokenCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    /// Index by subject for sign-out
    subjects: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            subjects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of entries that have not yet expired
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries and prune the subject index
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut subjects = self.subjects.write().await;

        let expired: Vec<(String, String)> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, entry)| (key.clone(), entry.subject_id.clone()))
            .collect();

        for (key, subject_id) in &expired {
            entries.remove(key);
            if let Some(keys) = subjects.get_mut(subject_id) {
                keys.remove(key);
                if keys.is_empty() {
                    subjects.remove(subject_id);
                }
            }
        }

        if !expired.is_empty() {
            log::debug!("Cleaned up {} expired cached tokens", expired.len());
        }
        expired.len()
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self: Arc<Self>, period: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        });
    }
}

impl Default for MemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn set(&self, subject_id: &str, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            subject_id: subject_id.to_string(),
            expires_at: Instant::now() + ttl,
        };

        let mut entries = self.entries.write().await;
        let mut subjects = self.subjects.write().await;
        entries.insert(key.to_string(), entry);
        subjects
            .entry(subject_id.to_string())
            .or_insert_with(HashSet::new)
            .insert(key.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let mut subjects = self.subjects.write().await;
        if let Some(entry) = entries.remove(key) {
            if let Some(keys) = subjects.get_mut(&entry.subject_id) {
                keys.remove(key);
                if keys.is_empty() {
                    subjects.remove(&entry.subject_id);
                }
            }
        }
        Ok(())
    }

    async fn delete_by_subject(&self, subject_id: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let mut subjects = self.subjects.write().await;

        let removed = subjects
            .remove(subject_id)
            .map(|keys| keys.iter().filter(|key| entries.remove(*key).is_some()).count())
            .unwrap_or(0);

        Ok(removed)
    }
}

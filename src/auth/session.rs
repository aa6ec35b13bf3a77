//! Session orchestration: sign-up, sign-in, refresh and sign-out
//!
//! Every successful authentication yields an access/refresh pair that is
//! recorded in the token cache before it is returned. The engine keeps no
//! mutable state of its own; users and issued tokens live in the stores.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::claims::ClaimsBuilder;
use crate::auth::token::{token_cache_key, IssuedToken, TokenKind, TokenSigner, VerifiedToken};
use crate::auth::user::UserIdentity;
use crate::auth::verifier::{CredentialVerifier, VerifyOutcome};
use crate::config::JwtOptions;
use crate::error::{AuthMeError, Result};
use crate::security::timing::constant_time_eq;
use crate::security_logger::{SecurityEvent, SecurityLogger};
use crate::storage::traits::{ProvisioningResult, SharedTokenCache, SharedUserStore};

/// Fallback reason when the user store rejects an account without saying why
pub const MSG_PROVISIONING_FAILED: &str = "The account could not be created";

/// Outcome of sign-up or sign-in.
///
/// `success` is true exactly when `errors` is empty, and tokens are present
/// exactly when an authentication succeeded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    errors: Vec<String>,
}

impl AuthResult {
    /// Account created, nothing issued
    pub fn provisioned() -> Self {
        Self {
            success: true,
            access_token: None,
            refresh_token: None,
            errors: Vec::new(),
        }
    }

    pub fn authenticated(pair: &TokenPair) -> Self {
        Self {
            success: true,
            access_token: Some(pair.access.token.clone()),
            refresh_token: Some(pair.refresh.token.clone()),
            errors: Vec::new(),
        }
    }

    /// Rejection with its reasons; an empty list gets a generic reason
    pub fn rejected<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut errors: Vec<String> = errors.into_iter().map(Into::into).collect();
        if errors.is_empty() {
            errors.push(MSG_PROVISIONING_FAILED.to_string());
        }
        Self {
            success: false,
            access_token: None,
            refresh_token: None,
            errors,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Access and refresh token issued together for one authentication
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Orchestrates verification, issuance and revocation
pub struct SessionManager {
    users: SharedUserStore,
    cache: SharedTokenCache,
    verifier: CredentialVerifier,
    signer: TokenSigner,
    options: JwtOptions,
    audit: Arc<SecurityLogger>,
}

impl SessionManager {
    /// Creates a session manager. Fails only on unusable signing configuration.
    pub fn new(users: SharedUserStore, cache: SharedTokenCache, options: JwtOptions) -> Result<Self> {
        let signer = TokenSigner::new(&options)?;
        Ok(Self {
            verifier: CredentialVerifier::new(users.clone()),
            users,
            cache,
            signer,
            options,
            audit: Arc::new(SecurityLogger::new()),
        })
    }

    /// Refuse password sign-in while the account's email is unconfirmed
    pub fn require_confirmed_email(mut self, required: bool) -> Self {
        self.verifier = self.verifier.require_confirmed_email(required);
        self
    }

    /// Share a security logger between several engines
    pub fn with_security_logger(mut self, audit: Arc<SecurityLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn security_logger(&self) -> Arc<SecurityLogger> {
        self.audit.clone()
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Create an account. Provisioning only: no tokens are issued.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResult> {
        match self.users.create_user(email, password).await? {
            ProvisioningResult::Created(user) => {
                // The account exists at this point; it keeps lockout enabled
                if let Err(e) = self.users.set_lockout_enabled(&user, false).await {
                    log::warn!("User {} created but lockout could not be disabled: {}", user.id, e);
                }
                self.audit
                    .log_event(SecurityEvent::AccountProvisioned { user_id: user.id.clone() })
                    .await;
                Ok(AuthResult::provisioned())
            }
            ProvisioningResult::Rejected(reasons) => {
                self.audit
                    .log_event(SecurityEvent::ProvisioningRejected { reasons: reasons.len() })
                    .await;
                Ok(AuthResult::rejected(reasons))
            }
        }
    }

    /// Password sign-in
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResult> {
        let outcome = self.verifier.verify_password(email, password).await?;
        self.complete_sign_in(outcome).await
    }

    /// Sign-in for a subject whose refresh token was already verified by the caller
    pub async fn sign_in_without_password(&self, user_id: &str) -> Result<AuthResult> {
        let outcome = self.verifier.verify_passwordless(user_id).await?;
        self.complete_sign_in(outcome).await
    }

    /// Remove every cached token of the subject. Idempotent.
    pub async fn sign_out(&self, user_id: &str) -> Result<()> {
        let removed = self.cache.delete_by_subject(user_id).await?;
        self.audit
            .log_event(SecurityEvent::SignedOut {
                user_id: user_id.to_string(),
                tokens_removed: removed,
            })
            .await;
        Ok(())
    }

    /// Verify a presented token and require it to still be recorded in the
    /// cache. `Ok(None)` means invalid, expired or revoked.
    pub async fn authenticate_token(&self, token: &str) -> Result<Option<VerifiedToken>> {
        let verified = match self.signer.verify(token) {
            Ok(verified) => verified,
            Err(e) => {
                self.audit
                    .log_event(SecurityEvent::TokenValidationFailed { reason: e.to_string() })
                    .await;
                return Ok(None);
            }
        };

        let cached = self.cache.get(&token_cache_key(&verified.claims.jti)).await?;
        match cached {
            Some(value) if constant_time_eq(&value, token) => Ok(Some(verified)),
            _ => {
                self.audit
                    .log_event(SecurityEvent::TokenRevoked {
                        user_id: verified.claims.subject.clone(),
                        token_id: verified.claims.jti.clone(),
                    })
                    .await;
                Ok(None)
            }
        }
    }

    async fn complete_sign_in(&self, outcome: VerifyOutcome) -> Result<AuthResult> {
        let user = match outcome {
            VerifyOutcome::Ok(user) => user,
            rejected => {
                self.audit
                    .log_event(SecurityEvent::AuthenticationFailed {
                        user_id: None,
                        reason: rejected.label().to_string(),
                    })
                    .await;
                return Ok(AuthResult::rejected(rejected.message()));
            }
        };

        self.audit
            .log_event(SecurityEvent::AuthenticationSuccess { user_id: user.id.clone() })
            .await;

        match self.issue_token_pair(&user).await {
            Ok(pair) => Ok(AuthResult::authenticated(&pair)),
            Err(e) => {
                self.audit
                    .log_event(SecurityEvent::IssuanceFailed {
                        user_id: user.id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Build, sign and record an access/refresh pair. Either both tokens are
    /// recorded and returned, or none is.
    pub async fn issue_token_pair(&self, user: &UserIdentity) -> Result<TokenPair> {
        let builder = ClaimsBuilder::new(self.users.as_ref());
        let access_claims = builder.build(user, true).await?;
        let refresh_claims = builder.build(user, false).await?;

        let now = Utc::now();
        let access_expiry = now + to_chrono(self.options.access_token_ttl)?;
        let refresh_expiry = now + to_chrono(self.options.refresh_token_ttl)?;

        let access = IssuedToken::new(
            self.signer.sign(&access_claims, access_expiry)?,
            &user.id,
            TokenKind::Access,
        );
        let refresh = IssuedToken::new(
            self.signer.sign(&refresh_claims, refresh_expiry)?,
            &user.id,
            TokenKind::Refresh,
        );

        self.record(&access).await?;
        if let Err(e) = self.record(&refresh).await {
            // Roll back so no half pair stays recorded
            if let Err(rollback) = self.cache.delete(&access.cache_key()).await {
                log::error!("Failed to roll back access token {}: {}", access.jti, rollback);
            }
            return Err(e);
        }

        self.audit
            .log_event(SecurityEvent::TokensIssued {
                user_id: user.id.clone(),
                access_jti: access.jti.clone(),
                refresh_jti: refresh.jti.clone(),
            })
            .await;

        Ok(TokenPair { access, refresh })
    }

    async fn record(&self, issued: &IssuedToken) -> Result<()> {
        let ttl = issued.remaining_ttl(Utc::now());
        self.cache
            .set(&issued.subject_id, &issued.cache_key(), &issued.token, ttl)
            .await
    }
}

fn to_chrono(ttl: std::time::Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(ttl)
        .map_err(|e| AuthMeError::ConfigError(format!("Token lifetime out of range: {}", e)))
}

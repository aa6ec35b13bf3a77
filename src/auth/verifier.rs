//! Credential verification against the user store

use crate::auth::user::UserIdentity;
use crate::error::Result;
use crate::storage::traits::SharedUserStore;

pub const MSG_LOCKED_OUT: &str = "This account is locked";
pub const MSG_NOT_ALLOWED: &str = "This account is not allowed to sign in";
pub const MSG_REQUIRES_TWO_FACTOR: &str = "Sign-in must be confirmed with your second authentication factor";
pub const MSG_INVALID_CREDENTIALS: &str = "Username or password is incorrect";
pub const MSG_EMAIL_NOT_CONFIRMED: &str = "This account must confirm its email before signing in";

/// Result of checking whether a user may start a session
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Ok(UserIdentity),
    LockedOut,
    NotAllowed,
    RequiresTwoFactor,
    /// Unknown identity or wrong password; never tells which
    InvalidCredentials,
    EmailNotConfirmed,
}

impl VerifyOutcome {
    /// User-facing message for a rejection, `None` on success
    pub fn message(&self) -> Option<&'static str> {
        match self {
            VerifyOutcome::Ok(_) => None,
            VerifyOutcome::LockedOut => Some(MSG_LOCKED_OUT),
            VerifyOutcome::NotAllowed => Some(MSG_NOT_ALLOWED),
            VerifyOutcome::RequiresTwoFactor => Some(MSG_REQUIRES_TWO_FACTOR),
            VerifyOutcome::InvalidCredentials => Some(MSG_INVALID_CREDENTIALS),
            VerifyOutcome::EmailNotConfirmed => Some(MSG_EMAIL_NOT_CONFIRMED),
        }
    }

    /// Short machine-readable label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            VerifyOutcome::Ok(_) => "ok",
            VerifyOutcome::LockedOut => "locked_out",
            VerifyOutcome::NotAllowed => "not_allowed",
            VerifyOutcome::RequiresTwoFactor => "requires_two_factor",
            VerifyOutcome::InvalidCredentials => "invalid_credentials",
            VerifyOutcome::EmailNotConfirmed => "email_not_confirmed",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyOutcome::Ok(_))
    }
}

/// Decides whether a user may sign in, by password or by an already-trusted subject id
pub struct CredentialVerifier {
    users: SharedUserStore,
    require_confirmed_email: bool,
}

impl CredentialVerifier {
    pub fn new(users: SharedUserStore) -> Self {
        Self {
            users,
            require_confirmed_email: false,
        }
    }

    /// Refuse password sign-in while the email is unconfirmed
    pub fn require_confirmed_email(mut self, required: bool) -> Self {
        self.require_confirmed_email = required;
        self
    }

    /// Password sign-in. Order: allowed, locked out, password, second factor.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<VerifyOutcome> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => return Ok(VerifyOutcome::InvalidCredentials),
        };

        if self.require_confirmed_email && !self.users.is_email_confirmed(&user).await? {
            return Ok(VerifyOutcome::NotAllowed);
        }

        if self.users.is_locked_out(&user).await? {
            return Ok(VerifyOutcome::LockedOut);
        }

        if !self.users.check_password(&user, password).await? {
            // The failed attempt may just have locked the account
            if self.users.is_locked_out(&user).await? {
                return Ok(VerifyOutcome::LockedOut);
            }
            return Ok(VerifyOutcome::InvalidCredentials);
        }

        if user.two_factor_enabled {
            return Ok(VerifyOutcome::RequiresTwoFactor);
        }

        Ok(VerifyOutcome::Ok(user))
    }

    /// Sign-in for a subject whose refresh token the caller already verified.
    /// Only lockout and email confirmation are checked.
    pub async fn verify_passwordless(&self, user_id: &str) -> Result<VerifyOutcome> {
        let user = match self.users.find_by_id(user_id).await? {
            Some(user) => user,
            None => return Ok(VerifyOutcome::InvalidCredentials),
        };

        if self.users.is_locked_out(&user).await? {
            return Ok(VerifyOutcome::LockedOut);
        }

        if !self.users.is_email_confirmed(&user).await? {
            return Ok(VerifyOutcome::EmailNotConfirmed);
        }

        Ok(VerifyOutcome::Ok(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryUserStore;
    use crate::storage::traits::{ProvisioningResult, UserStore};
    use std::sync::Arc;

    const PASSWORD: &str = "Val1d!pass";

    async fn setup() -> (Arc<MemoryUserStore>, UserIdentity) {
        let store = Arc::new(MemoryUserStore::new());
        let user = match store.create_user("frank@example.com", PASSWORD).await.unwrap() {
            ProvisioningResult::Created(user) => user,
            ProvisioningResult::Rejected(errors) => panic!("{:?}", errors),
        };
        (store, user)
    }

    #[tokio::test]
    async fn test_valid_password() {
        let (store, user) = setup().await;
        let verifier = CredentialVerifier::new(store);

        match verifier.verify_password("frank@example.com", PASSWORD).await.unwrap() {
            VerifyOutcome::Ok(found) => assert_eq!(found.id, user.id),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_alike() {
        let (store, _) = setup().await;
        let verifier = CredentialVerifier::new(store);

        let unknown = verifier.verify_password("nobody@example.com", PASSWORD).await.unwrap();
        let wrong = verifier.verify_password("frank@example.com", "Wr0ng!pass").await.unwrap();
        assert_eq!(unknown.message(), wrong.message());
        assert_eq!(unknown.message(), Some(MSG_INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_locked_out_regardless_of_password() {
        let (store, user) = setup().await;
        store
            .set_lockout_end(&user.id, Some(chrono::Utc::now() + chrono::Duration::hours(1)))
            .await
            .unwrap();
        let verifier = CredentialVerifier::new(store);

        let good = verifier.verify_password("frank@example.com", PASSWORD).await.unwrap();
        let bad = verifier.verify_password("frank@example.com", "nope").await.unwrap();
        assert!(matches!(good, VerifyOutcome::LockedOut));
        assert!(matches!(bad, VerifyOutcome::LockedOut));
    }

    #[tokio::test]
    async fn test_two_factor_required() {
        let (store, user) = setup().await;
        store.set_two_factor_enabled(&user.id, true).await.unwrap();
        let verifier = CredentialVerifier::new(store);

        let outcome = verifier.verify_password("frank@example.com", PASSWORD).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::RequiresTwoFactor));
    }

    #[tokio::test]
    async fn test_not_allowed_when_confirmation_required() {
        let (store, user) = setup().await;
        store.set_email_confirmed(&user.id, false).await.unwrap();

        let lenient = CredentialVerifier::new(store.clone());
        assert!(lenient.verify_password("frank@example.com", PASSWORD).await.unwrap().is_ok());

        let strict = CredentialVerifier::new(store).require_confirmed_email(true);
        let outcome = strict.verify_password("frank@example.com", PASSWORD).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::NotAllowed));
    }

    #[tokio::test]
    async fn test_passwordless_checks() {
        let (store, user) = setup().await;
        let verifier = CredentialVerifier::new(store.clone());

        assert!(verifier.verify_passwordless(&user.id).await.unwrap().is_ok());
        assert!(matches!(
            verifier.verify_passwordless("missing").await.unwrap(),
            VerifyOutcome::InvalidCredentials
        ));

        store.set_email_confirmed(&user.id, false).await.unwrap();
        assert!(matches!(
            verifier.verify_passwordless(&user.id).await.unwrap(),
            VerifyOutcome::EmailNotConfirmed
        ));

        store
            .set_lockout_end(&user.id, Some(chrono::Utc::now() + chrono::Duration::hours(1)))
            .await
            .unwrap();
        assert!(matches!(
            verifier.verify_passwordless(&user.id).await.unwrap(),
            VerifyOutcome::LockedOut
        ));
    }
}

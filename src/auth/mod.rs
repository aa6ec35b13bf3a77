//! Credential verification and token issuance engine

pub mod claims;
pub mod password;
pub mod session;
pub mod token;
pub mod user;
pub mod verifier;

// Re-export main components
pub use claims::{ClaimSet, ClaimsBuilder};
pub use session::{AuthResult, SessionManager, TokenPair};
pub use token::{IssuedToken, SignedToken, TokenKind, TokenSigner, VerifiedToken};
pub use user::{Claim, UserIdentity};
pub use verifier::{CredentialVerifier, VerifyOutcome};

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::auth::claims::ClaimSet;
use crate::auth::user::Claim;
use crate::config::JwtOptions;
use crate::constants::TOKEN_KEY_PREFIX;
use crate::error::{AuthMeError, Result};

/// Which half of a token pair a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Custom claim value: one string, or an array when a name repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Single(String),
    Multiple(Vec<String>),
}

/// JWT payload as it goes over the wire
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    /// JWT ID
    pub jti: String,
    /// Not before (as UTC timestamp)
    pub nbf: i64,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    /// Custom claims keyed by name
    #[serde(flatten)]
    pub custom: BTreeMap<String, ClaimValue>,
    /// Role names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role: Vec<String>,
}

impl TokenClaims {
    fn from_claim_set(claims: &ClaimSet, issuer: &str, audience: &str, exp: i64) -> Self {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for claim in &claims.user_claims {
            grouped
                .entry(claim.name.clone())
                .or_default()
                .push(claim.value.clone());
        }

        let custom = grouped
            .into_iter()
            .map(|(name, mut values)| {
                let value = if values.len() == 1 {
                    ClaimValue::Single(values.remove(0))
                } else {
                    ClaimValue::Multiple(values)
                };
                (name, value)
            })
            .collect();

        Self {
            iss: issuer.to_string(),
            aud: audience.to_string(),
            sub: claims.subject.clone(),
            email: claims.email.clone(),
            jti: claims.jti.clone(),
            nbf: claims.not_before,
            iat: claims.issued_at,
            exp,
            custom,
            role: claims.roles.clone(),
        }
    }

    fn into_claim_set(self) -> ClaimSet {
        let mut user_claims = Vec::new();
        for (name, value) in self.custom {
            match value {
                ClaimValue::Single(value) => user_claims.push(Claim::new(name, value)),
                ClaimValue::Multiple(values) => {
                    user_claims.extend(values.into_iter().map(|value| Claim::new(name.clone(), value)))
                }
            }
        }

        ClaimSet {
            subject: self.sub,
            email: self.email,
            jti: self.jti,
            not_before: self.nbf,
            issued_at: self.iat,
            user_claims,
            roles: self.role,
        }
    }
}

/// Output of signing a claim set
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub jti: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A token that passed signature, issuer, audience and lifetime checks
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: ClaimSet,
    pub expires_at: DateTime<Utc>,
}

/// A token handed out to a user and recorded in the token cache
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub jti: String,
    pub subject_id: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub token: String,
}

impl IssuedToken {
    pub fn new(signed: SignedToken, subject_id: &str, kind: TokenKind) -> Self {
        Self {
            jti: signed.jti,
            subject_id: subject_id.to_string(),
            kind,
            expires_at: signed.expires_at,
            token: signed.token,
        }
    }

    /// Cache key for this token
    pub fn cache_key(&self) -> String {
        token_cache_key(&self.jti)
    }

    /// Time left until expiry, zero once expired
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Cache key under which the token with this jti is recorded
pub fn token_cache_key(jti: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, jti)
}

/// Signs and verifies JWTs with the configured key, issuer and audience
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl TokenSigner {
    /// Creates a signer, failing on unusable key material
    pub fn new(options: &JwtOptions) -> Result<Self> {
        options.validate()?;

        let mut validation = Validation::new(options.algorithm);
        validation.set_issuer(&[options.issuer.as_str()]);
        validation.set_audience(&[options.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
        validation.validate_nbf = true;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(options.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(options.secret.as_bytes()),
            header: Header::new(options.algorithm),
            validation,
            issuer: options.issuer.clone(),
            audience: options.audience.clone(),
        })
    }

    /// Generates a signed JWT for the claim set, valid until `expires_at`
    pub fn sign(&self, claims: &ClaimSet, expires_at: DateTime<Utc>) -> Result<SignedToken> {
        let payload = TokenClaims::from_claim_set(claims, &self.issuer, &self.audience, expires_at.timestamp());

        let token = encode(&self.header, &payload, &self.encoding_key)
            .map_err(|e| AuthMeError::TokenError(format!("Failed to generate token: {}", e)))?;

        Ok(SignedToken {
            jti: claims.jti.clone(),
            token,
            expires_at,
        })
    }

    /// Validates and decodes a JWT
    pub fn verify(&self, token: &str) -> Result<VerifiedToken> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthMeError::TokenError(format!("Invalid token: {}", e)))?;

        let expires_at = DateTime::<Utc>::from_timestamp(data.claims.exp, 0)
            .ok_or_else(|| AuthMeError::TokenError("Expiry out of range".to_string()))?;

        Ok(VerifiedToken {
            claims: data.claims.into_claim_set(),
            expires_at,
        })
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "signer_unit_key_7c1e9f04_with_enough_length";

    fn signer() -> TokenSigner {
        TokenSigner::new(&JwtOptions::new(SECRET, "authme-test", "authme-test-clients")).unwrap()
    }

    fn sample_claims(with_extras: bool) -> ClaimSet {
        let now = Utc::now().timestamp();
        ClaimSet {
            subject: "user-1".to_string(),
            email: "user@example.com".to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            not_before: now,
            issued_at: now,
            user_claims: if with_extras {
                vec![
                    Claim::new("scope", "read"),
                    Claim::new("scope", "write"),
                    Claim::new("tenant", "north"),
                ]
            } else {
                Vec::new()
            },
            roles: if with_extras { vec!["admin".to_string()] } else { Vec::new() },
        }
    }

    #[test]
    fn test_sign_then_verify_returns_same_claims() {
        let signer = signer();
        let claims = sample_claims(true);
        let expires_at = Utc::now() + chrono::Duration::minutes(5);

        let signed = signer.sign(&claims, expires_at).unwrap();
        assert_eq!(signed.jti, claims.jti);

        let verified = signer.verify(&signed.token).unwrap();
        assert_eq!(verified.claims, claims);
        assert_eq!(verified.expires_at.timestamp(), expires_at.timestamp());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let claims = sample_claims(false);
        let token = signer()
            .sign(&claims, Utc::now() + chrono::Duration::minutes(5))
            .unwrap()
            .token;

        let other = TokenSigner::new(&JwtOptions::new(SECRET, "authme-test", "someone-else")).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = sample_claims(false);
        // Beyond the default 60s leeway
        let token = signer()
            .sign(&claims, Utc::now() - chrono::Duration::minutes(5))
            .unwrap()
            .token;
        assert!(signer().verify(&token).is_err());
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let result = TokenSigner::new(&JwtOptions::new("short", "iss", "aud"));
        assert!(matches!(result, Err(AuthMeError::ConfigError(_))));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def".to_string()));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_issued_token_cache_key_and_ttl() {
        let now = Utc::now();
        let issued = IssuedToken::new(
            SignedToken {
                jti: "abc".to_string(),
                token: "t".to_string(),
                expires_at: now + chrono::Duration::seconds(90),
            },
            "user-1",
            TokenKind::Access,
        );
        assert_eq!(issued.cache_key(), "token:abc");
        assert_eq!(issued.remaining_ttl(now), Duration::from_secs(90));
        assert_eq!(issued.remaining_ttl(now + chrono::Duration::seconds(120)), Duration::ZERO);
    }
}

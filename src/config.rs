//! Service configuration module
//! Handles signing options, token lifetimes and cache endpoint for the auth service

use crate::constants::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_AUDIENCE, DEFAULT_HOST, DEFAULT_ISSUER,
    DEFAULT_MIN_AUTH_DURATION_MS, DEFAULT_PORT, DEFAULT_REFRESH_TOKEN_TTL_SECS,
};
use crate::error::{AuthMeError, Result};
use jsonwebtoken::Algorithm;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Token signing options. Built once and handed to the engine; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct JwtOptions {
    /// Symmetric signing key
    pub secret: String,
    /// HMAC algorithm used to sign tokens
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of access tokens
    pub access_token_ttl: Duration,
    /// Lifetime of refresh tokens
    pub refresh_token_ttl: Duration,
}

impl JwtOptions {
    /// Creates signing options with default lifetimes and HS256
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            issuer: issuer.into(),
            audience: audience.into(),
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    /// Check key material and lifetimes. Called by the token signer at construction.
    pub fn validate(&self) -> Result<()> {
        validate_secret(&self.secret)?;

        if !matches!(self.algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthMeError::ConfigError(format!(
                "Unsupported signing algorithm {:?}: only HS256, HS384 and HS512 are accepted",
                self.algorithm
            )));
        }
        if self.issuer.trim().is_empty() || self.audience.trim().is_empty() {
            return Err(AuthMeError::ConfigError(
                "JWT issuer and audience must not be empty".to_string(),
            ));
        }
        if self.access_token_ttl.is_zero() || self.refresh_token_ttl.is_zero() {
            return Err(AuthMeError::ConfigError(
                "Access and refresh token lifetimes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Validate that a signing secret meets security requirements
fn validate_secret(secret: &str) -> Result<()> {
    if secret.len() < 32 {
        return Err(AuthMeError::ConfigError(
            "JWT secret must be at least 32 characters long".to_string(),
        ));
    }

    // Check for insecure default or example values
    let insecure_patterns = [
        "your-secret-key",
        "change-this",
        "changeme",
        "INSECURE-DEFAULT",
        "password",
        "12345",
    ];

    for pattern in &insecure_patterns {
        if secret.contains(pattern) {
            return Err(AuthMeError::ConfigError(format!(
                "JWT secret contains insecure pattern '{}'. Please use a secure random secret generated with: openssl rand -base64 32",
                pattern
            )));
        }
    }

    if secret.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AuthMeError::ConfigError(
            "JWT secret should contain mixed characters (letters, numbers, symbols) for security"
                .to_string(),
        ));
    }

    Ok(())
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt: JwtOptions,
    /// Address of the shared token cache; in-memory cache when absent
    pub cache_url: Option<String>,
    /// Refuse password sign-in for accounts whose email is not confirmed
    pub require_confirmed_email: bool,
    /// Minimum duration of a failed sign-in response
    pub min_auth_duration: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        panic!("ServerConfig::default() is not allowed for security reasons. Use ServerConfig::from_env() instead.");
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Accepts `redis://` and `rediss://` endpoints
fn validate_cache_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        AuthMeError::ConfigError(format!("AUTHME_CACHE_URL is not a valid URL: {}", e))
    })?;
    match parsed.scheme() {
        "redis" | "rediss" => Ok(()),
        other => Err(AuthMeError::ConfigError(format!(
            "AUTHME_CACHE_URL must use the redis or rediss scheme, got '{}'",
            other
        ))),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env::var("AUTHME_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env_parse("AUTHME_PORT").unwrap_or(DEFAULT_PORT);

        let secret = env::var("AUTHME_JWT_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .map_err(|_| {
                AuthMeError::ConfigError(
                    "JWT_SECRET environment variable is required for security. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;

        let algorithm = match env::var("AUTHME_JWT_ALGORITHM") {
            Ok(raw) => Algorithm::from_str(&raw).map_err(|_| {
                AuthMeError::ConfigError(format!("Unknown JWT algorithm '{}'", raw))
            })?,
            Err(_) => Algorithm::HS256,
        };

        let issuer = env::var("AUTHME_JWT_ISSUER").unwrap_or(DEFAULT_ISSUER.to_string());
        let audience = env::var("AUTHME_JWT_AUDIENCE").unwrap_or(DEFAULT_AUDIENCE.to_string());

        let access_ttl = env_parse("AUTHME_ACCESS_TOKEN_TTL_SECS").unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_SECS);
        let refresh_ttl = env_parse("AUTHME_REFRESH_TOKEN_TTL_SECS").unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_SECS);

        let cache_url = env::var("AUTHME_CACHE_URL").ok().filter(|v| !v.trim().is_empty());
        if let Some(ref raw) = cache_url {
            validate_cache_url(raw)?;
        }

        let require_confirmed_email = env_flag("AUTHME_REQUIRE_CONFIRMED_EMAIL").unwrap_or(false);
        let min_auth_ms = env_parse("AUTHME_MIN_AUTH_DURATION_MS").unwrap_or(DEFAULT_MIN_AUTH_DURATION_MS);

        let jwt = JwtOptions::new(secret, issuer, audience)
            .with_algorithm(algorithm)
            .with_access_token_ttl(Duration::from_secs(access_ttl))
            .with_refresh_token_ttl(Duration::from_secs(refresh_ttl));
        jwt.validate()?;

        if jwt.refresh_token_ttl < jwt.access_token_ttl {
            log::warn!(
                "Refresh token lifetime ({}s) is shorter than access token lifetime ({}s)",
                refresh_ttl,
                access_ttl
            );
        }

        Ok(Self {
            host,
            port,
            jwt,
            cache_url,
            require_confirmed_email,
            min_auth_duration: Duration::from_millis(min_auth_ms),
        })
    }
}

use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum AuthMeError {
    // Configuration errors
    ConfigError(String),

    // Token errors
    TokenError(String),

    // Storage errors
    NotFound(String),
    StorageError(String),
    CacheError(String),

    // Credential errors
    PasswordHashError(String),

    // System errors
    SystemError(String),
}

impl AuthMeError {
    /// True when the failure comes from an unreachable or failing collaborator
    /// (User Store, Token Cache) rather than from the caller's input.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_) | Self::CacheError(_) | Self::SystemError(_)
        )
    }
}

impl fmt::Display for AuthMeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::TokenError(msg) => write!(f, "Token error: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::StorageError(msg) => write!(f, "User store error: {}", msg),
            Self::CacheError(msg) => write!(f, "Token cache error: {}", msg),
            Self::PasswordHashError(msg) => write!(f, "Password hashing error: {}", msg),
            Self::SystemError(msg) => write!(f, "System error: {}", msg),
        }
    }
}

impl Error for AuthMeError {}

impl From<jsonwebtoken::errors::Error> for AuthMeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthMeError::TokenError(err.to_string())
    }
}

#[cfg(feature = "redis-cache")]
impl From<redis::RedisError> for AuthMeError {
    fn from(err: redis::RedisError) -> Self {
        AuthMeError::CacheError(err.to_string())
    }
}

// Generic result type for AuthMe
pub type Result<T> = std::result::Result<T, AuthMeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_errors() {
        assert!(AuthMeError::StorageError("down".to_string()).is_infrastructure());
        assert!(AuthMeError::CacheError("down".to_string()).is_infrastructure());
        assert!(!AuthMeError::TokenError("bad".to_string()).is_infrastructure());
        assert!(!AuthMeError::NotFound("user".to_string()).is_infrastructure());
    }
}

// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const API_PREFIX: &str = "api";
pub const API_VERSION: &str = "v1";

// Token lifetimes (seconds)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 10800;
pub const DEFAULT_ISSUER: &str = "authme";
pub const DEFAULT_AUDIENCE: &str = "authme-clients";

// Token cache key layout
pub const TOKEN_KEY_PREFIX: &str = "token:";
pub const SUBJECT_INDEX_PREFIX: &str = "token-subject:";

// Failed sign-in responses are padded to this duration
pub const DEFAULT_MIN_AUTH_DURATION_MS: u64 = 100;

// Account lockout applied by the in-memory user store
pub const MAX_FAILED_ACCESS_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 5;

//! Storage backends for user records and issued tokens

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis_cache;
pub mod traits;

// Re-export main components
pub use memory::{MemoryTokenCache, MemoryUserStore};
pub use traits::{ProvisioningResult, SharedTokenCache, SharedUserStore, TokenCache, UserStore};

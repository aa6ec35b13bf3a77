//! Redis-backed token cache shared by every service instance
//!
//! Tokens are stored as plain string keys with a TTL. Each subject also gets a
//! set of its token keys so that sign-out can find them without a keyspace scan.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use super::traits::TokenCache;
use crate::constants::SUBJECT_INDEX_PREFIX;
use crate::error::Result;

pub struct RedisTokenCache {
    connection: ConnectionManager,
}

impl RedisTokenCache {
    /// Connect to the cache at `url` (`redis://host:port/db`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        log::info!("Connected to token cache at {}", url);
        Ok(Self { connection })
    }

    fn subject_key(subject_id: &str) -> String {
        format!("{}{}", SUBJECT_INDEX_PREFIX, subject_id)
    }
}

/// Redis rejects a zero expiry
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn set(&self, subject_id: &str, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let secs = ttl_secs(ttl);
        let index = Self::subject_key(subject_id);

        // The index lives as long as its longest-lived member: NX sets a first
        // expiry, GT only ever extends it.
        let _: () = redis::pipe()
            .atomic()
            .set_ex(key, value, secs)
            .ignore()
            .sadd(&index, key)
            .ignore()
            .cmd("EXPIRE")
            .arg(&index)
            .arg(secs)
            .arg("NX")
            .ignore()
            .cmd("EXPIRE")
            .arg(&index)
            .arg(secs)
            .arg("GT")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: usize = conn.del(key).await?;
        Ok(())
    }

    async fn delete_by_subject(&self, subject_id: &str) -> Result<usize> {
        let mut conn = self.connection.clone();
        let index = Self::subject_key(subject_id);

        let keys: Vec<String> = conn.smembers(&index).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        // Only the members read above leave the index; a key added meanwhile
        // by a concurrent sign-in stays findable for the next sign-out.
        let (removed,): (usize,) = redis::pipe()
            .atomic()
            .del(&keys)
            .srem(&index, &keys)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }
}

//! Redis credential store. Redis enforces the TTLs itself.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::{CredentialStore, StoreError};

/// Redis-backed store with a key prefix shared by every key it touches.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Connect to `url`. The connection manager reconnects on its own.
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        info!(url = %mask_redis_url(url), "Connecting to Redis");

        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("Connected to Redis");
        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl CredentialStore for RedisStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let _: () = self
            .conn()
            .set_ex(self.prefixed_key(key), value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn().get(self.prefixed_key(key)).await?)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(self.prefixed_key(key))
            .query_async(&mut self.conn())
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: u64 = self.conn().del(self.prefixed_key(key)).await?;
        Ok(removed > 0)
    }

    async fn add_member(&self, set: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let set = self.prefixed_key(set);
        let _: () = redis::pipe()
            .atomic()
            .sadd(&set, member)
            .ignore()
            .expire(&set, ttl.as_secs().max(1) as i64)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        Ok(())
    }

    async fn remove_member(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let _: () = self.conn().srem(self.prefixed_key(set), member).await?;
        Ok(())
    }

    async fn take_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let set = self.prefixed_key(set);
        let (members,): (Vec<String>,) = redis::pipe()
            .atomic()
            .smembers(&set)
            .del(&set)
            .ignore()
            .query_async(&mut self.conn())
            .await?;
        Ok(members)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let pong: String = redis::cmd("PING").query_async(&mut self.conn()).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::UnexpectedReply(pong))
        }
    }
}

/// Mask the password in a Redis URL for logging.
fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}

//! Read-through price cache (§6 `redis` config, §4.6 step 3a).
//!
//! Grounded on the teacher pack's `GasHistoryStore` pattern
//! (`dallonby-mev-base`): a lazily-connected `ConnectionManager` behind
//! an `Option`, so a Redis outage degrades to "cache disabled" rather
//! than panicking the collector.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A cached price sample, keyed by pair address (§4.6 step 3a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPrice {
    pub price: String,
    pub inverse_price: String,
    pub reserve0: String,
    pub reserve1: String,
    pub block_number: u64,
    pub sampled_at: DateTime<Utc>,
}

impl CachedPrice {
    /// Cache entries older than 60s are treated as a miss (§8 boundary behavior).
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.sampled_at).num_seconds() < 60
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_price(&self, pair_address: &str) -> Option<CachedPrice>;
    async fn set_price(&self, pair_address: &str, value: &CachedPrice, ttl_s: u64);
}

/// A cache that never stores anything — used when `redis.enabled = false` (§6).
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn get_price(&self, _pair_address: &str) -> Option<CachedPrice> {
        None
    }
    async fn set_price(&self, _pair_address: &str, _value: &CachedPrice, _ttl_s: u64) {}
}

pub struct RedisCache {
    conn: Arc<RwLock<Option<ConnectionManager>>>,
    key_prefix: String,
}

impl RedisCache {
    pub async fn connect(host: &str, port: u16, password: &str, db: i64) -> Self {
        let cache = Self {
            conn: Arc::new(RwLock::new(None)),
            key_prefix: "dexwatch:price:".to_string(),
        };

        let url = if password.is_empty() {
            format!("redis://{host}:{port}/{db}")
        } else {
            format!("redis://:{password}@{host}:{port}/{db}")
        };
        let conn_slot = cache.conn.clone();
        tokio::spawn(async move {
            match RedisClient::open(url) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        debug!("connected to redis price cache");
                        *conn_slot.write().await = Some(conn);
                    }
                    Err(e) => warn!(error = %e, "failed to create redis connection manager"),
                },
                Err(e) => warn!(error = %e, "failed to open redis client"),
            }
        });

        cache
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_price(&self, pair_address: &str) -> Option<CachedPrice> {
        let guard = self.conn.read().await;
        let conn = guard.as_ref()?;
        let mut conn = conn.clone();
        let key = format!("{}{}", self.key_prefix, pair_address);
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(pair = pair_address, error = %e, "failed to decode cached price");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(pair = pair_address, error = %e, "redis get failed");
                None
            }
        }
    }

    async fn set_price(&self, pair_address: &str, value: &CachedPrice, ttl_s: u64) {
        let guard = self.conn.read().await;
        let Some(conn) = guard.as_ref() else {
            return;
        };
        let mut conn = conn.clone();
        let key = format!("{}{}", self.key_prefix, pair_address);
        let Ok(raw) = serde_json::to_string(value) else {
            return;
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(&key, raw, ttl_s).await {
            warn!(pair = pair_address, error = %e, "redis set failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_boundary_is_sixty_seconds() {
        let now = Utc::now();
        let fresh = CachedPrice {
            price: "1".into(),
            inverse_price: "1".into(),
            reserve0: "1".into(),
            reserve1: "1".into(),
            block_number: 1,
            sampled_at: now - chrono::Duration::seconds(59),
        };
        assert!(fresh.is_fresh(now));

        let stale = CachedPrice {
            sampled_at: now - chrono::Duration::seconds(61),
            ..fresh
        };
        assert!(!stale.is_fresh(now));
    }
}

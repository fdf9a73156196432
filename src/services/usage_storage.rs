use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::RedisConfig;
use crate::error::AppError;
use crate::utils::Clock;

/// Counter and cardinality backend shared by every server process.
///
/// Both write operations must be atomic on the backend: concurrent calls for
/// the same key never race between increment and expiry, or between add and
/// expiry refresh.
#[async_trait]
pub trait UsageStorage: Send + Sync {
    /// Increments `key` by one and returns the new count. `ttl` is applied
    /// only when this call created the key.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, AppError>;

    /// Adds `member` to the approximate set at `key` and resets its expiry
    /// to `ttl` from now.
    async fn add_unique(&self, key: &str, member: &str, ttl: Duration) -> Result<(), AppError>;

    /// Estimated number of distinct members at `key`; 0 when absent or expired.
    async fn count_unique(&self, key: &str) -> Result<u64, AppError>;
}

// INCR and first-time EXPIRE in one round trip, executed atomically by Redis.
const INCR_WITH_EXPIRY_LUA: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

static INCR_WITH_EXPIRY: Lazy<redis::Script> = Lazy::new(|| redis::Script::new(INCR_WITH_EXPIRY_LUA));

/// Redis-based storage (distributed)
#[derive(Clone)]
pub struct RedisUsageStorage {
    connection_manager: Arc<redis::aio::ConnectionManager>,
    key_prefix: Option<String>,
}

impl RedisUsageStorage {
    pub async fn connect(redis_url: &str, key_prefix: Option<String>) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        info!("Redis connection established for usage tracking: {}", redis_url);

        Ok(Self {
            connection_manager: Arc::new(connection_manager),
            key_prefix,
        })
    }

    fn namespaced<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.key_prefix {
            Some(prefix) => Cow::Owned(format!("{}:{}", prefix, key)),
            None => Cow::Borrowed(key),
        }
    }
}

#[async_trait]
impl UsageStorage for RedisUsageStorage {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, AppError> {
        let key = self.namespaced(key);
        let mut conn = self.connection_manager.as_ref().clone();

        let count: i64 = INCR_WITH_EXPIRY
            .key(key.as_ref())
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn add_unique(&self, key: &str, member: &str, ttl: Duration) -> Result<(), AppError> {
        let key = self.namespaced(key);
        let mut conn = self.connection_manager.as_ref().clone();

        let _: () = redis::pipe()
            .atomic()
            .pfadd(key.as_ref(), member)
            .ignore()
            .expire(key.as_ref(), ttl.as_secs() as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn count_unique(&self, key: &str) -> Result<u64, AppError> {
        use redis::AsyncCommands;

        let key = self.namespaced(key);
        let mut conn = self.connection_manager.as_ref().clone();

        let count: u64 = conn.pfcount(key.as_ref()).await?;
        Ok(count)
    }
}

#[derive(Debug, Clone)]
struct CounterEntry {
    count: u64,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct UniqueSetEntry {
    members: HashSet<String>,
    expires_at: DateTime<Utc>,
}

/// In-memory storage using DashMap (single instance). Sets are exact rather
/// than approximate, which satisfies the same contract.
#[derive(Clone)]
pub struct MemoryUsageStorage {
    counters: Arc<DashMap<String, CounterEntry>>,
    unique_sets: Arc<DashMap<String, UniqueSetEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryUsageStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            unique_sets: Arc::new(DashMap::new()),
            clock,
        }
    }

    fn expiry_from_now(&self, ttl: Duration) -> Result<DateTime<Utc>, AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::Internal(format!("Invalid expiry {:?}: {}", ttl, e)))?;
        Ok(self.clock.now() + ttl)
    }

    /// Drops every expired counter and set, returning how many were removed.
    /// Keys written while the sweep runs can make the count an underestimate.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.key_count();

        self.counters.retain(|_, entry| entry.expires_at > now);
        self.unique_sets.retain(|_, entry| entry.expires_at > now);

        before.saturating_sub(self.key_count())
    }

    pub fn key_count(&self) -> usize {
        self.counters.len() + self.unique_sets.len()
    }

    /// Start a background task for cleaning up expired entries
    pub fn start_cleanup_task(&self, cleanup_interval: Duration) {
        let storage = self.clone();
        info!(
            "Starting usage storage cleanup task (interval: {}s)",
            cleanup_interval.as_secs()
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            loop {
                interval.tick().await;
                let removed = storage.cleanup_expired();
                debug!("Usage storage cleanup removed {} expired keys", removed);
            }
        });
    }
}

#[async_trait]
impl UsageStorage for MemoryUsageStorage {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, AppError> {
        let now = self.clock.now();
        let expires_at = self.expiry_from_now(ttl)?;

        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry { count: 0, expires_at });

        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = expires_at;
        }
        entry.count += 1;

        Ok(entry.count)
    }

    async fn add_unique(&self, key: &str, member: &str, ttl: Duration) -> Result<(), AppError> {
        let now = self.clock.now();
        let expires_at = self.expiry_from_now(ttl)?;

        let mut entry = self
            .unique_sets
            .entry(key.to_string())
            .or_insert_with(|| UniqueSetEntry {
                members: HashSet::new(),
                expires_at,
            });

        if entry.expires_at <= now {
            entry.members.clear();
        }
        entry.members.insert(member.to_string());
        entry.expires_at = expires_at;

        Ok(())
    }

    async fn count_unique(&self, key: &str) -> Result<u64, AppError> {
        let now = self.clock.now();
        Ok(self
            .unique_sets
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.members.len() as u64)
            .unwrap_or(0))
    }
}

/// Initialize usage storage based on configuration. Redis is used whenever a
/// URL is configured; failing to reach it is a startup error.
pub async fn create_usage_storage(
    config: &RedisConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn UsageStorage>, AppError> {
    match &config.url {
        Some(url) => {
            let storage = RedisUsageStorage::connect(url, config.key_prefix.clone())
                .await
                .map_err(|e| {
                    AppError::Configuration(format!("Failed to connect to Redis: {}", e))
                })?;
            info!("Redis connected for usage tracking");
            Ok(Arc::new(storage))
        }
        None => {
            warn!("REDIS_URL is not set; usage counters are kept in process memory");
            let storage = MemoryUsageStorage::new(clock);
            storage.start_cleanup_task(Duration::from_secs(300));
            Ok(Arc::new(storage))
        }
    }
}

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const KEY_PREFIX: &str = "revoked:";

/// A degraded cache must not stall authentication.
const CACHE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tracks token ids that must no longer be honored.
///
/// `revoke` is an atomic insert-if-absent: under a concurrent replay of the
/// same token, at most one caller observes `true`.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record `token_id` as revoked for `ttl_seconds` (clamped to >= 1).
    /// Returns false when the id was already revoked.
    async fn revoke(&self, token_id: &str, ttl_seconds: i64) -> bool;

    /// Whether `token_id` has been revoked and the entry has not expired.
    async fn is_revoked(&self, token_id: &str) -> bool;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

/// Truncated SHA-256 of the token id. Only this fingerprint reaches the
/// store, so a compromised cache never yields replayable ids.
pub fn fingerprint(token_id: &str) -> String {
    let digest = Sha256::digest(token_id.as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn cache_key(token_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, fingerprint(token_id))
}

fn clamp_ttl(ttl_seconds: i64) -> Duration {
    Duration::from_secs(ttl_seconds.max(1) as u64)
}

fn insert_if_absent(entries: &mut HashMap<String, Instant>, key: String, ttl: Duration) -> bool {
    let now = Instant::now();
    entries.retain(|_, expiry| *expiry > now);
    if entries.contains_key(&key) {
        false
    } else {
        entries.insert(key, now + ttl);
        true
    }
}

/// Shared revocation store backed by Redis, with a process-local fallback.
///
/// When the cache is unreachable, entries land in a local map instead. The
/// trade is availability over consistency: a token revoked during an outage
/// may still be honored by other process instances, or after a restart,
/// until it expires on its own.
pub struct RedisRevocationStore {
    manager: ConnectionManager,
    fallback: Mutex<HashMap<String, Instant>>,
    degraded: AtomicBool,
}

impl RedisRevocationStore {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %url, "Connecting to revocation cache");
        let client = Client::open(url)?;

        // ConnectionManager reconnects automatically after outages
        let manager = client.get_connection_manager().await.map_err(|e| {
            anyhow::anyhow!("Failed to connect to revocation cache: {}", e)
        })?;

        Ok(Self {
            manager,
            fallback: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        })
    }

    async fn try_revoke_shared(&self, key: &str, ttl: Duration) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let set = tokio::time::timeout(
            CACHE_TIMEOUT,
            redis::cmd("SET")
                .arg(key)
                .arg("1")
                .arg("NX")
                .arg("EX")
                .arg(ttl.as_secs())
                .query_async::<_, Option<String>>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Revocation cache write timed out"))??;

        // NX: Some("OK") when newly set, Nil when the key already existed
        Ok(set.is_some())
    }

    async fn try_contains_shared(&self, key: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let exists = tokio::time::timeout(
            CACHE_TIMEOUT,
            redis::cmd("EXISTS")
                .arg(key)
                .query_async::<_, bool>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Revocation cache read timed out"))??;

        Ok(exists)
    }

    fn fallback_revoke(&self, key: String, ttl: Duration) -> bool {
        let Ok(mut entries) = self.fallback.lock() else {
            return false;
        };
        insert_if_absent(&mut entries, key, ttl)
    }

    fn fallback_contains(&self, key: &str) -> bool {
        let Ok(mut entries) = self.fallback.lock() else {
            return false;
        };
        let now = Instant::now();
        entries.retain(|_, expiry| *expiry > now);
        entries.contains_key(key)
    }

    /// Log the outage once, not once per request.
    fn note_failure(&self, err: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                error = %err,
                "Revocation cache unreachable; using process-local fallback"
            );
        }
    }

    fn note_recovery(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            tracing::info!("Revocation cache reachable again");
        }
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, token_id: &str, ttl_seconds: i64) -> bool {
        let key = cache_key(token_id);
        let ttl = clamp_ttl(ttl_seconds);

        // An entry recorded locally during an outage still counts
        if self.fallback_contains(&key) {
            return false;
        }

        match self.try_revoke_shared(&key, ttl).await {
            Ok(newly_revoked) => {
                self.note_recovery();
                newly_revoked
            }
            Err(e) => {
                self.note_failure(&e);
                self.fallback_revoke(key, ttl)
            }
        }
    }

    async fn is_revoked(&self, token_id: &str) -> bool {
        let key = cache_key(token_id);

        if self.fallback_contains(&key) {
            return true;
        }

        match self.try_contains_shared(&key).await {
            Ok(found) => {
                self.note_recovery();
                found
            }
            Err(e) => {
                self.note_failure(&e);
                // Fallback already consulted; nothing else to honor
                false
            }
        }
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        tokio::time::timeout(
            CACHE_TIMEOUT,
            redis::cmd("PING").query_async::<_, String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Revocation cache ping timed out"))?
        .map_err(|e| anyhow::anyhow!("Revocation cache ping failed: {}", e))?;
        Ok(())
    }
}

/// Process-local revocation store.
///
/// Used when no shared cache is configured, and in tests. No cross-process
/// visibility and no persistence across restarts.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token_id: &str, ttl_seconds: i64) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        insert_if_absent(&mut entries, cache_key(token_id), clamp_ttl(ttl_seconds))
    }

    async fn is_revoked(&self, token_id: &str) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        let now = Instant::now();
        entries.retain(|_, expiry| *expiry > now);
        entries.contains_key(&cache_key(token_id))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

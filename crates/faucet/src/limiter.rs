//! Time-windowed record of which identities have claimed recently.

use moka::sync::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Longest block the limiter records.
pub const MAX_BLOCK: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `now + ttl` on the tokio clock, saturating at [`MAX_BLOCK`] from now.
pub(crate) fn deadline_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .or_else(|| now.checked_add(MAX_BLOCK))
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy)]
struct Block {
    until: Instant,
    ttl: Duration,
}

/// Evicts each entry once its own ttl has elapsed.
struct BlockExpiry;

impl Expiry<String, Block> for BlockExpiry {
    fn expire_after_create(&self, _key: &String, value: &Block, _created_at: std::time::Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Block,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Keys (recipient addresses or request origins) that may not claim until
/// their entry expires.
///
/// Eligibility is decided by comparing the stored deadline with the tokio
/// clock, so an entry whose deadline has passed reads as absent even if the
/// cache has not evicted it yet.
pub struct ClaimLimiter {
    entries: Cache<String, Block>,
}

impl Default for ClaimLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimLimiter {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(BlockExpiry).build(),
        }
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        self.remaining(key).is_some()
    }

    /// Time left before `key` becomes eligible again.
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        let block = self.entries.get(key)?;
        let now = Instant::now();
        (block.until > now).then(|| block.until - now)
    }

    pub fn mark(&self, key: &str, ttl: Duration) {
        self.mark_all(&[key], ttl);
    }

    /// Blocks every key in `keys` for `ttl`, all from the same instant.
    /// A `ttl` past [`MAX_BLOCK`] is clamped to it.
    pub fn mark_all(&self, keys: &[&str], ttl: Duration) {
        let ttl = ttl.min(MAX_BLOCK);
        let block = Block {
            until: deadline_after(ttl),
            ttl,
        };
        for key in keys {
            self.entries.insert((*key).to_string(), block);
        }
    }

    /// Removes entries whose deadline has passed. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, block)| block.until <= now)
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_str());
        }
        self.entries.run_pending_tasks();
        expired.len()
    }

    /// Number of keys currently blocked.
    pub fn blocked_count(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|(_, block)| block.until > now).count()
    }

    /// Runs [`sweep`](Self::sweep) every `period` until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(removed, "swept expired rate-limit entries");
                }
            }
        })
    }
}

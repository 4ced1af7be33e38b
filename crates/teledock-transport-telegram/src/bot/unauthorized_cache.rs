//! Unauthorized access log throttling
//!
//! Commands from users outside the admin list get no answer at all. Every
//! attempt is still visible in the logs, but a user hammering the bot is only
//! reported once per cooldown period so the log stays readable.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Cache of users recently reported as unauthorized
///
/// Entries expire after the cooldown; the cache is bounded so a flood of
/// distinct senders cannot grow it without limit.
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// Moka cache storing user_id -> () mappings with automatic TTL
    cache: Cache<i64, ()>,
    /// Cooldown duration between reports for the same user
    cooldown: Duration,
    /// Counter for silenced attempts (for logging throttling)
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Creates a new `UnauthorizedCache`
    ///
    /// # Arguments
    ///
    /// * `cooldown_secs` - Seconds between reports for the same user
    /// * `max_capacity` - Maximum number of entries in cache
    ///
    /// # Examples
    ///
    /// ```
    /// use teledock_transport_telegram::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(
    ///     1200,   // 20 minutes cooldown
    ///     10_000  // max 10k entries
    /// );
    /// assert_eq!(cache.silenced_count(), 0);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cooldown = Duration::from_secs(cooldown_secs);
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown)
            .build();

        Self {
            cache,
            cooldown,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records an unauthorized attempt
    ///
    /// The first attempt of a user within the cooldown is logged at `info`
    /// and returns `true`. Later attempts are counted; only every 100th of
    /// them is logged, at `debug`.
    pub async fn record(&self, user_id: i64, user_name: &str, command: &str) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            self.cache.insert(user_id, ()).await;
            info!(
                user_id,
                user_name,
                command,
                "⛔️ Unauthorized command ignored"
            );
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count.is_multiple_of(100) {
            debug!(
                "⛔️ Silenced {} unauthorized attempts (recent: user {} - {})",
                count, user_id, user_name
            );
        }

        false
    }

    /// Returns the current number of entries in the cache
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the total number of silenced unauthorized attempts
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Returns the configured cooldown duration
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::infrastructure::config::AuthConfig;

/// Token bucket parameters shared by every key.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub per_second: f64,
    /// Bucket capacity; a new key starts full.
    pub burst: u32,
    /// Upper bound on buckets kept in memory.
    pub max_tracked_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_second: 100.0, burst: 100, max_tracked_keys: 100_000 }
    }
}

impl From<&AuthConfig> for RateLimitConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            per_second: config.rate_limit_per_second,
            burst: config.rate_limit_burst,
            max_tracked_keys: config.rate_limit_max_keys,
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self { tokens: capacity, last_refill: now }
    }

    fn available_at(&self, now: Instant, rate: f64, capacity: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * rate).min(capacity)
    }

    fn try_take(&mut self, now: Instant, rate: f64, capacity: f64) -> bool {
        self.tokens = self.available_at(now, rate, capacity);
        self.last_refill = self.last_refill.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-key token bucket limiter.
///
/// Each key gets an independent bucket created at full capacity on first
/// use. Creation goes through the map's entry API, so concurrent first
/// requests for the same key all share one bucket. A bucket that has been
/// idle long enough to refill completely is indistinguishable from a new
/// one and may be evicted at any time.
#[derive(Debug)]
pub struct KeyedRateLimiter {
    buckets: DashMap<String, TokenBucket>,
    config: RateLimitConfig,
}

impl KeyedRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { buckets: DashMap::new(), config }
    }

    /// Consume one token for `key`; `false` means the request must be refused.
    pub fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Instant::now())
    }

    pub fn admit_at(&self, key: &str, now: Instant) -> bool {
        let rate = self.config.per_second;
        let capacity = f64::from(self.config.burst);

        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_take(now, rate, capacity);
        }

        if self.buckets.len() >= self.config.max_tracked_keys {
            self.evict_idle(now);
            if self.buckets.len() >= self.config.max_tracked_keys {
                warn!(
                    tracked_keys = self.buckets.len(),
                    "Rate limiter is tracking the maximum number of keys, refusing new key"
                );
                return false;
            }
        }

        let mut bucket =
            self.buckets.entry(key.to_owned()).or_insert_with(|| TokenBucket::full(capacity, now));
        bucket.try_take(now, rate, capacity)
    }

    /// Drop buckets that have refilled to capacity. Returns how many were removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let rate = self.config.per_second;
        let capacity = f64::from(self.config.burst);
        let before = self.buckets.len();

        self.buckets.retain(|_, bucket| bucket.available_at(now, rate, capacity) < capacity);

        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, remaining = self.buckets.len(), "Evicted idle rate limit buckets");
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Whole seconds until a drained bucket has a token again.
    pub fn retry_after(&self) -> Duration {
        let secs = (1.0 / self.config.per_second).ceil().max(1.0);
        Duration::from_secs(secs as u64)
    }

    /// Periodically evict idle buckets until the returned handle is aborted.
    pub fn spawn_eviction_task(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.evict_idle(Instant::now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn limiter(per_second: f64, burst: u32) -> KeyedRateLimiter {
        KeyedRateLimiter::new(RateLimitConfig { per_second, burst, max_tracked_keys: 1_000 })
    }

    #[test]
    fn fresh_key_gets_full_burst_then_is_refused() {
        let limiter = limiter(1.0, 3);
        let now = Instant::now();

        assert!(limiter.admit_at("sk_A", now));
        assert!(limiter.admit_at("sk_A", now));
        assert!(limiter.admit_at("sk_A", now));
        assert!(!limiter.admit_at("sk_A", now));
    }

    #[test]
    fn tokens_refill_at_the_steady_rate() {
        let limiter = limiter(2.0, 2);
        let start = Instant::now();

        assert!(limiter.admit_at("sk_A", start));
        assert!(limiter.admit_at("sk_A", start));
        assert!(!limiter.admit_at("sk_A", start));

        // Half a second at 2/s restores exactly one token.
        let later = start + Duration::from_millis(500);
        assert!(limiter.admit_at("sk_A", later));
        assert!(!limiter.admit_at("sk_A", later));
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let limiter = limiter(10.0, 2);
        let start = Instant::now();
        assert!(limiter.admit_at("sk_A", start));

        let much_later = start + Duration::from_secs(3_600);
        assert!(limiter.admit_at("sk_A", much_later));
        assert!(limiter.admit_at("sk_A", much_later));
        assert!(!limiter.admit_at("sk_A", much_later));
    }

    #[test]
    fn keys_are_limited_independently() {
        let limiter = limiter(0.001, 1);
        let now = Instant::now();

        assert!(limiter.admit_at("sk_A", now));
        assert!(!limiter.admit_at("sk_A", now));
        assert!(limiter.admit_at("sk_B", now));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn concurrent_first_requests_share_one_bucket() {
        let limiter = Arc::new(limiter(0.001, 10));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    if limiter.admit("sk_NEW") {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 10);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn idle_buckets_are_evicted_once_replenished() {
        let limiter = limiter(1.0, 2);
        let start = Instant::now();
        assert!(limiter.admit_at("sk_A", start));
        assert!(limiter.admit_at("sk_B", start));

        assert_eq!(limiter.evict_idle(start), 0);
        assert_eq!(limiter.evict_idle(start + Duration::from_secs(2)), 2);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn tracked_keys_are_bounded() {
        let limiter =
            KeyedRateLimiter::new(RateLimitConfig { per_second: 0.001, burst: 5, max_tracked_keys: 2 });
        let now = Instant::now();

        assert!(limiter.admit_at("sk_A", now));
        assert!(limiter.admit_at("sk_B", now));
        assert!(!limiter.admit_at("sk_C", now));
        assert!(limiter.admit_at("sk_A", now));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn retry_after_rounds_up_to_whole_seconds() {
        assert_eq!(limiter(100.0, 1).retry_after(), Duration::from_secs(1));
        assert_eq!(limiter(0.25, 1).retry_after(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn eviction_task_runs_until_aborted() {
        let limiter = Arc::new(limiter(1_000.0, 1));
        assert!(limiter.admit("sk_A"));

        let handle = Arc::clone(&limiter).spawn_eviction_task(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(limiter.tracked_keys(), 0);
    }
}

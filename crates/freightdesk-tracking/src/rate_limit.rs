//! Outbound rate limiting for carrier API calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use freightdesk_carrier::CarrierType;

/// Token bucket rate limiter.
pub struct TokenBucket {
    /// Maximum tokens in the bucket.
    capacity: u64,
    /// Current number of tokens.
    tokens: AtomicU64,
    /// Tokens to add per refill.
    refill_rate: u64,
    /// Refill interval.
    refill_interval: Duration,
    /// Last refill time.
    last_refill: Mutex<Instant>,
}

impl TokenBucket {
    /// Create a new token bucket.
    #[must_use]
    pub fn new(capacity: u64, refill_rate: u64, refill_interval: Duration) -> Self {
        Self {
            capacity,
            tokens: AtomicU64::new(capacity),
            refill_rate,
            refill_interval,
            last_refill: Mutex::new(Instant::now()),
        }
    }

    /// Create a rate limiter for N requests per minute.
    ///
    /// Refills every second with 1/60th of the rate so a burst cannot
    /// consume more than the per-minute budget up front.
    #[must_use]
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let per_minute = u64::from(requests_per_minute);
        let refill_rate = per_minute.div_ceil(60);
        Self::new(per_minute, refill_rate, Duration::from_secs(1))
    }

    /// Try to acquire a token.
    ///
    /// Returns true if a token was acquired, false if rate limited.
    pub async fn try_acquire(&self) -> bool {
        self.refill().await;

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .tokens
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Acquire a token, waiting if necessary.
    pub async fn acquire(&self) {
        while !self.try_acquire().await {
            tokio::time::sleep(self.refill_interval / 10).await;
        }
    }

    /// Get the current number of available tokens.
    pub fn available(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }

    /// Check if rate limited (no tokens available).
    pub fn is_limited(&self) -> bool {
        self.available() == 0
    }

    /// Refill tokens based on elapsed time.
    async fn refill(&self) {
        let mut last_refill = self.last_refill.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(*last_refill);

        if elapsed >= self.refill_interval {
            let intervals = elapsed.as_secs_f64() / self.refill_interval.as_secs_f64();
            let new_tokens = (intervals as u64) * self.refill_rate;

            if new_tokens > 0 {
                loop {
                    let current = self.tokens.load(Ordering::Relaxed);
                    let new_count = (current + new_tokens).min(self.capacity);
                    if self
                        .tokens
                        .compare_exchange(current, new_count, Ordering::SeqCst, Ordering::Relaxed)
                        .is_ok()
                    {
                        break;
                    }
                }
                *last_refill = now;
            }
        }
    }
}

/// One token bucket per carrier, sized from carrier configuration.
///
/// A bucket survives across syncs so the per-minute budget is shared by
/// every sync touching that carrier. When a carrier is reconfigured
/// with a different rate the old bucket is replaced on the next
/// acquisition.
#[derive(Default)]
pub struct CarrierRateLimiters {
    buckets: RwLock<HashMap<CarrierType, (u32, Arc<TokenBucket>)>>,
}

impl CarrierRateLimiters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the bucket for a carrier, creating or resizing it to match
    /// `requests_per_minute`.
    pub async fn bucket_for(
        &self,
        carrier: CarrierType,
        requests_per_minute: u32,
    ) -> Arc<TokenBucket> {
        {
            let buckets = self.buckets.read().await;
            if let Some((rate, bucket)) = buckets.get(&carrier) {
                if *rate == requests_per_minute {
                    return bucket.clone();
                }
            }
        }

        let mut buckets = self.buckets.write().await;
        // Re-check under the write lock; a concurrent caller may have
        // installed the resized bucket already.
        if let Some((rate, bucket)) = buckets.get(&carrier) {
            if *rate == requests_per_minute {
                return bucket.clone();
            }
        }

        tracing::debug!(
            carrier = %carrier,
            requests_per_minute = requests_per_minute,
            "Creating carrier rate limit bucket"
        );
        let bucket = Arc::new(TokenBucket::per_minute(requests_per_minute));
        buckets.insert(carrier, (requests_per_minute, bucket.clone()));
        bucket
    }

    /// Wait for a request slot against the carrier's budget.
    pub async fn acquire(&self, carrier: CarrierType, requests_per_minute: u32) {
        self.bucket_for(carrier, requests_per_minute)
            .await
            .acquire()
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_bucket_basic() {
        let bucket = TokenBucket::new(10, 1, Duration::from_millis(100));

        for _ in 0..10 {
            assert!(bucket.try_acquire().await);
        }

        assert!(!bucket.try_acquire().await);
        assert!(bucket.is_limited());
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let bucket = TokenBucket::new(5, 5, Duration::from_millis(50));

        for _ in 0..5 {
            assert!(bucket.try_acquire().await);
        }
        assert!(bucket.is_limited());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(bucket.try_acquire().await);
    }

    #[tokio::test]
    async fn test_per_minute_derivation() {
        let bucket = TokenBucket::per_minute(60);
        assert_eq!(bucket.capacity, 60);
        assert_eq!(bucket.refill_rate, 1);
        assert_eq!(bucket.refill_interval, Duration::from_secs(1));

        // Rates under 60 still refill at least one token per second.
        let slow = TokenBucket::per_minute(10);
        assert_eq!(slow.capacity, 10);
        assert_eq!(slow.refill_rate, 1);
    }

    #[tokio::test]
    async fn test_bucket_reused_for_same_rate() {
        let limiters = CarrierRateLimiters::new();
        let first = limiters.bucket_for(CarrierType::Ups, 60).await;
        let second = limiters.bucket_for(CarrierType::Ups, 60).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_bucket_replaced_on_rate_change() {
        let limiters = CarrierRateLimiters::new();
        let first = limiters.bucket_for(CarrierType::Ups, 60).await;
        let resized = limiters.bucket_for(CarrierType::Ups, 120).await;
        assert!(!Arc::ptr_eq(&first, &resized));
        assert_eq!(resized.available(), 120);
    }

    #[tokio::test]
    async fn test_buckets_are_per_carrier() {
        let limiters = CarrierRateLimiters::new();
        let ups = limiters.bucket_for(CarrierType::Ups, 60).await;
        let dhl = limiters.bucket_for(CarrierType::Dhl, 60).await;
        assert!(!Arc::ptr_eq(&ups, &dhl));

        while ups.try_acquire().await {}
        assert!(ups.is_limited());
        assert!(!dhl.is_limited());
    }
}

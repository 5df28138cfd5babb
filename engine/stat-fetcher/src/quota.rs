//! Rate-limit backoff shared by every worker drawing on the same quota

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep_until, Instant};

/// Quota bucket used for every request to the stats API
pub const API_BUCKET: &str = "api";

/// Longest single block a bucket accepts
pub const MAX_BLOCK: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-bucket "do not send before" instants.
///
/// When one worker is told to back off, every other worker of that bucket
/// waits out the same pause before its next request.
#[derive(Clone, Default)]
pub struct QuotaGate {
    blocked_until: Arc<RwLock<HashMap<String, Instant>>>,
}

impl QuotaGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the bucket is open
    pub async fn wait(&self, bucket: &str) {
        loop {
            let until = self.blocked_until.read().await.get(bucket).copied();
            match until {
                Some(until) if until > Instant::now() => sleep_until(until).await,
                _ => return,
            }
        }
    }

    /// Close the bucket for `pause` from now, capped at [`MAX_BLOCK`].
    /// An existing, longer block is kept.
    pub async fn block_for(&self, bucket: &str, pause: Duration) {
        let now = Instant::now();
        let cap = now + MAX_BLOCK;
        let until = now.checked_add(pause).map_or(cap, |until| until.min(cap));
        let mut blocked = self.blocked_until.write().await;
        let entry = blocked.entry(bucket.to_string()).or_insert(until);
        if *entry < until {
            *entry = until;
        }
    }

    /// Instant the bucket reopens, if it is currently closed
    pub async fn blocked_until(&self, bucket: &str) -> Option<Instant> {
        let until = self.blocked_until.read().await.get(bucket).copied()?;
        (until > Instant::now()).then_some(until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_honours_block() {
        let gate = QuotaGate::new();
        let start = Instant::now();

        gate.wait(API_BUCKET).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        gate.block_for(API_BUCKET, Duration::from_secs(5)).await;
        gate.wait(API_BUCKET).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(gate.blocked_until(API_BUCKET).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_block_saturates() {
        let gate = QuotaGate::new();
        let start = Instant::now();

        gate.block_for(API_BUCKET, Duration::MAX).await;
        gate.block_for(API_BUCKET, Duration::from_secs_f64(1e19)).await;

        assert_eq!(gate.blocked_until(API_BUCKET).await, Some(start + MAX_BLOCK));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_block_does_not_shrink_longer_one() {
        let gate = QuotaGate::new();
        let start = Instant::now();

        gate.block_for(API_BUCKET, Duration::from_secs(10)).await;
        gate.block_for(API_BUCKET, Duration::from_secs(2)).await;
        gate.wait(API_BUCKET).await;

        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_is_shared_between_clones() {
        let gate = QuotaGate::new();
        let worker = gate.clone();
        let start = Instant::now();

        gate.block_for(API_BUCKET, Duration::from_secs(3)).await;
        worker.wait(API_BUCKET).await;
        assert!(start.elapsed() >= Duration::from_secs(3));

        // Other buckets are unaffected
        let other = Instant::now();
        worker.wait("other").await;
        assert_eq!(other.elapsed(), Duration::ZERO);
    }
}

//! Uniform pacing for served downloads
//!
//! Every chunk is followed by the same delay, `chunk_size / bytes_per_second`.
//! There is no bucket and no burst allowance: drift from slow reads is not
//! caught up, so the long-run rate stays at or below the configured limit.

use ota_types::RateLimitConfig;
use std::time::Duration;

/// Bytes read and emitted per pacing step
pub const CHUNK_SIZE: usize = 1024;

/// Per-stream pacer derived from the process-wide rate limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    chunk_size: usize,
    delay: Duration,
}

impl RateLimiter {
    /// Create a pacer for `chunk_size`-byte chunks at the configured rate
    pub fn new(config: RateLimitConfig, chunk_size: usize) -> Self {
        // kbps is non-zero by construction
        let delay = Duration::from_secs_f64(chunk_size as f64 / config.bytes_per_second() as f64);
        Self { chunk_size, delay }
    }

    /// Pacer with the standard chunk size
    pub fn for_config(config: RateLimitConfig) -> Self {
        Self::new(config, CHUNK_SIZE)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Delay applied after each emitted chunk
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Suspend the calling task for one chunk's worth of time.
    /// Only this task waits; sibling requests keep running.
    pub async fn pace(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

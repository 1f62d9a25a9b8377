//! Serving engine
//!
//! - Uniform per-chunk pacing derived from the bandwidth limit
//! - Lazy, paced file streams that own their file handle

mod rate_limiter;
mod throttled_stream;

pub use rate_limiter::*;
pub use throttled_stream::*;

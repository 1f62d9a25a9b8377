//! Shared types for the FPV OTA server
//!
//! This crate contains the plain data structures used by both the
//! core library and the HTTP server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default served bandwidth in kilobytes per second
pub const DEFAULT_BW_LIMIT_KBPS: u32 = 128;

/// Default port the server binds to
pub const DEFAULT_PORT: u16 = 81;

/// Default directory holding the served archives
pub const DEFAULT_STORAGE_DIR: &str = "/srv/fpv_server/static";

/// Release listing queried by a fetch
pub const DEFAULT_RELEASE_URL: &str =
    "https://api.github.com/repos/OpenIPC/builder/releases/latest";

/// Token that marks FPV firmware among the release assets
pub const DEFAULT_MARKER: &str = "fpv";

/// Archive suffix of served and fetched firmware
pub const DEFAULT_SUFFIX: &str = ".tgz";

// ============================================================================
// Configuration
// ============================================================================

/// Invalid startup configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bandwidth limit must be a positive number of KB/s, got {0}")]
    NonPositiveRate(i64),

    #[error("bandwidth limit {0} KB/s is too large")]
    RateTooLarge(i64),

    #[error("bandwidth limit is not a number: {0:?}")]
    NotANumber(String),
}

/// Served bandwidth limit, fixed at startup and shared by every stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    kbps: NonZeroU32,
}

impl RateLimitConfig {
    /// Validate a bandwidth limit given in kilobytes per second
    pub fn new(kbps: i64) -> Result<Self, ConfigError> {
        if kbps <= 0 {
            return Err(ConfigError::NonPositiveRate(kbps));
        }
        let kbps = u32::try_from(kbps)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(ConfigError::RateTooLarge(kbps))?;
        Ok(Self { kbps })
    }

    pub fn kbps(&self) -> u32 {
        self.kbps.get()
    }

    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.kbps.get()) * 1024
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            kbps: NonZeroU32::new(DEFAULT_BW_LIMIT_KBPS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl FromStr for RateLimitConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotANumber(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for RateLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} KB/s", self.kbps)
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// A firmware archive sitting in the storage directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub filename: String,
    pub size: u64,
    pub path: PathBuf,
}

// ============================================================================
// Fetching
// ============================================================================

/// One fetch invocation, carrying the optional board keyword
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    keyword: Option<String>,
}

impl FetchRequest {
    /// Build from a raw form value; surrounding whitespace is dropped and
    /// an empty keyword means no filter
    pub fn new(raw: Option<&str>) -> Self {
        let keyword = raw
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Self { keyword }
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }
}

/// Rule deciding which release assets are firmware worth downloading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFilter {
    /// Substring every relevant asset URL carries
    pub marker: String,
    /// Suffix the asset URL must end with
    pub suffix: String,
    /// Compare the marker ignoring ASCII case
    #[serde(default)]
    pub case_insensitive_marker: bool,
}

impl AssetFilter {
    pub fn new(marker: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            suffix: suffix.into(),
            case_insensitive_marker: false,
        }
    }

    pub fn case_insensitive_marker(mut self, enabled: bool) -> Self {
        self.case_insensitive_marker = enabled;
        self
    }

    /// Check an asset URL against the marker, the suffix and an optional
    /// keyword. The keyword is always an exact, case-sensitive substring.
    pub fn matches(&self, url: &str, keyword: Option<&str>) -> bool {
        if !url.ends_with(&self.suffix) {
            return false;
        }

        let has_marker = if self.case_insensitive_marker {
            url.to_ascii_lowercase()
                .contains(&self.marker.to_ascii_lowercase())
        } else {
            url.contains(&self.marker)
        };
        if !has_marker {
            return false;
        }

        keyword.map_or(true, |k| url.contains(k))
    }
}

impl Default for AssetFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER, DEFAULT_SUFFIX)
    }
}

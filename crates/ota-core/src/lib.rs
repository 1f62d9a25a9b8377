//! OTA Core - firmware serving and fetching
//!
//! This crate serves firmware archives from a storage directory at a
//! bounded byte rate and refreshes them from a remote release listing,
//! recording each fetch in a shared status log.

pub mod engine;
mod error;
mod fetch_log;
mod fetcher;
mod storage;

pub use engine::{RateLimiter, ThrottledStream, CHUNK_SIZE};
pub use error::*;
pub use fetch_log::*;
pub use fetcher::*;
pub use storage::*;

use ota_types::{Artifact, FetchRequest, RateLimitConfig};
use std::path::PathBuf;
use tracing::info;

/// Everything the core needs at startup
#[derive(Debug, Clone)]
pub struct OtaConfig {
    pub storage_dir: PathBuf,
    pub rate: RateLimitConfig,
    pub fetcher: FetcherConfig,
}

/// The main OTA core instance, shared by all request handlers
#[derive(Debug, Clone)]
pub struct OtaCore {
    /// Served archives
    store: ArtifactStore,
    /// Status of the latest fetch
    log: FetchLog,
    /// Release downloader writing into `store` and `log`
    fetcher: ReleaseFetcher,
    /// Process-wide serving rate
    rate: RateLimitConfig,
}

impl OtaCore {
    /// Create a new core, creating the storage directory if needed
    pub async fn new(config: OtaConfig) -> Result<Self, OtaError> {
        let store = ArtifactStore::new(config.storage_dir, config.fetcher.filter.suffix.clone()).await?;
        let log = FetchLog::new();
        let fetcher = ReleaseFetcher::new(config.fetcher, store.clone(), log.clone())?;

        info!("Storage directory: {}", store.dir().display());

        Ok(Self {
            store,
            log,
            fetcher,
            rate: config.rate,
        })
    }

    pub fn log(&self) -> &FetchLog {
        &self.log
    }

    pub fn rate(&self) -> RateLimitConfig {
        self.rate
    }

    /// Archives currently available for download
    pub async fn artifacts(&self) -> Result<Vec<Artifact>, OtaError> {
        self.store.list().await
    }

    /// Open a stored archive as a paced stream
    pub async fn open_artifact(&self, name: &str) -> Result<ThrottledStream, OtaError> {
        let path = self.store.resolve(name).await?;
        engine::stream(&path, self.rate).await
    }

    /// Clear the status log, then run a complete fetch
    pub async fn fetch(&self, request: &FetchRequest) {
        self.log.clear();
        self.fetcher.run(request).await;
    }

    /// The last `n` status lines
    pub fn fetch_status(&self, n: usize) -> Vec<String> {
        self.log.tail(n)
    }
}

//! Release fetcher
//!
//! One run walks `Querying -> Filtering -> Downloading(i) -> Done`:
//! - GET the release listing
//! - keep asset URLs that pass the [`AssetFilter`] and the request keyword
//! - download each one into the storage directory, in listing order
//!
//! Every outcome is reported through the [`FetchLog`]; nothing is returned.
//! A failed download is logged and the next one is still attempted.

use crate::error::OtaError;
use crate::fetch_log::FetchLog;
use crate::storage::ArtifactStore;
use futures::StreamExt;
use ota_types::{AssetFilter, FetchRequest, DEFAULT_RELEASE_URL};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Logged when the release listing cannot be retrieved
pub const MSG_API_FAILED: &str = "Failed to contact GitHub API.";

/// Logged when the listing has no asset passing the filters
pub const MSG_NO_MATCH: &str = "No matching firmware found.";

/// Deadline for the whole release listing query
pub const DEFAULT_LISTING_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest a download may go without receiving a byte
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Where to look for releases and what to pick from them
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub release_url: String,
    pub filter: AssetFilter,
    /// Total deadline of the listing request
    pub listing_timeout: Duration,
    /// Per-read deadline; an asset body has no total deadline
    pub idle_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            release_url: DEFAULT_RELEASE_URL.to_string(),
            filter: AssetFilter::default(),
            listing_timeout: DEFAULT_LISTING_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Downloads matching release assets into the artifact store
#[derive(Debug, Clone)]
pub struct ReleaseFetcher {
    client: Client,
    config: FetcherConfig,
    store: ArtifactStore,
    log: FetchLog,
}

impl ReleaseFetcher {
    pub fn new(
        config: FetcherConfig,
        store: ArtifactStore,
        log: FetchLog,
    ) -> Result<Self, OtaError> {
        // the GitHub API refuses requests without a user agent
        let client = Client::builder()
            .user_agent(concat!("fpv-ota/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(config.idle_timeout)
            .build()?;

        Ok(Self {
            client,
            config,
            store,
            log,
        })
    }

    /// Run one fetch to completion. The caller clears the log beforehand.
    ///
    /// Overlapping runs are not serialized; their log lines may interleave
    /// and downloads of the same filename race, last writer wins.
    pub async fn run(&self, request: &FetchRequest) {
        info!(
            "Fetching release listing from {} (keyword: {:?})",
            self.config.release_url,
            request.keyword()
        );

        let body = match self.query().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Release listing query failed: {}", e);
                self.log.append(MSG_API_FAILED);
                return;
            }
        };

        let urls = self.matching_urls(&body, request.keyword());
        if urls.is_empty() {
            info!("No release asset matched");
            self.log.append(MSG_NO_MATCH);
            return;
        }

        info!("{} release assets matched", urls.len());
        for url in &urls {
            self.download_one(url).await;
        }
    }

    async fn query(&self) -> Result<String, OtaError> {
        let response = self
            .client
            .get(&self.config.release_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(self.config.listing_timeout)
            .send()
            .await
            .map_err(|e| OtaError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OtaError::ServerError {
                status: status.as_u16(),
                message: format!("release listing {}", self.config.release_url),
            });
        }

        response
            .text()
            .await
            .map_err(|e| OtaError::Transport(e.to_string()))
    }

    /// Download URLs from `body` that pass the filter, in listing order
    pub fn matching_urls(&self, body: &str, keyword: Option<&str>) -> Vec<String> {
        extract_download_urls(body)
            .into_iter()
            .filter(|url| self.config.filter.matches(url, keyword))
            .collect()
    }

    async fn download_one(&self, url: &str) {
        let filename = match asset_filename(url) {
            Ok(filename) => filename,
            Err(e) => {
                warn!("Skipping asset: {}", e);
                self.log.append(format!("Failed: {url}"));
                return;
            }
        };

        self.log.append(format!("Downloading: {filename}"));
        info!("Downloading {} from {}", filename, url);

        match self.download_to_store(url, &filename).await {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes)", filename, bytes);
                self.log.append(format!("Success: {filename}"));
            }
            Err(e) => {
                warn!("{}", e);
                self.log.append(format!("Failed: {filename}"));
            }
        }
    }

    /// Write the asset under a scratch name, then move it over any previous
    /// file of the same name. On failure the scratch file is removed and the
    /// previous file is left untouched.
    async fn download_to_store(&self, url: &str, filename: &str) -> Result<u64, OtaError> {
        let partial = self.store.partial_destination(filename);
        let destination = self.store.destination(filename);

        let result = async {
            let written = self.write_body(url, &partial).await?;
            fs::rename(&partial, &destination).await?;
            Ok::<_, OtaError>(written)
        }
        .await;

        match result {
            Ok(written) => Ok(written),
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                Err(OtaError::Download {
                    filename: filename.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn write_body(&self, url: &str, path: &Path) -> Result<u64, OtaError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OtaError::ServerError {
                status: status.as_u16(),
                message: format!("GET {url}"),
            });
        }

        let mut file = File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }
}

// ============================================================================
// Listing parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Listing {
    Many(Vec<Release>),
    One(Release),
}

#[derive(Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Deserialize)]
struct ReleaseAsset {
    browser_download_url: String,
}

/// Every `browser_download_url` in a release listing.
///
/// Accepts a single release object or an array of releases. Bodies that are
/// not JSON of that shape are scanned line by line for
/// `"browser_download_url": "<url>"`.
pub fn extract_download_urls(body: &str) -> Vec<String> {
    match serde_json::from_str::<Listing>(body) {
        Ok(Listing::Many(releases)) => releases
            .into_iter()
            .flat_map(|r| r.assets)
            .map(|a| a.browser_download_url)
            .collect(),
        Ok(Listing::One(release)) => release
            .assets
            .into_iter()
            .map(|a| a.browser_download_url)
            .collect(),
        Err(_) => body.lines().filter_map(scan_line).collect(),
    }
}

fn scan_line(line: &str) -> Option<String> {
    const KEY: &str = "\"browser_download_url\"";

    let rest = &line[line.find(KEY)? + KEY.len()..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Final non-empty path segment of an asset URL
pub fn asset_filename(url: &str) -> Result<String, OtaError> {
    let parsed = url::Url::parse(url).map_err(|_| OtaError::InvalidUrl(url.to_string()))?;

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| OtaError::InvalidUrl(url.to_string()))
}

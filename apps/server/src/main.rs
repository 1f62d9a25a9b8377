//! FPV OTA Server
//!
//! Lists firmware archives, fetches new ones from the release feed on
//! demand and serves them at a limited bandwidth.

mod render;
mod routes;

use anyhow::{Context, Result};
use clap::Parser;
use ota_core::{FetcherConfig, OtaConfig, OtaCore};
use ota_types::{
    AssetFilter, RateLimitConfig, DEFAULT_MARKER, DEFAULT_PORT, DEFAULT_RELEASE_URL,
    DEFAULT_STORAGE_DIR, DEFAULT_SUFFIX,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// FPV firmware server
#[derive(Parser, Debug)]
#[command(name = "ota-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Limit served download bandwidth in KB/s
    #[arg(long = "bw-limit", env = "OTA_BW_LIMIT", default_value = "128")]
    bw_limit: RateLimitConfig,

    /// Address to bind
    #[arg(long, env = "OTA_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "OTA_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory holding the served archives
    #[arg(long, env = "OTA_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
    storage_dir: PathBuf,

    /// Release listing queried by a fetch
    #[arg(long, env = "OTA_RELEASE_URL", default_value = DEFAULT_RELEASE_URL)]
    release_url: String,

    /// Substring marking relevant release assets
    #[arg(long, env = "OTA_MARKER", default_value = DEFAULT_MARKER)]
    marker: String,

    /// Archive suffix of listed and fetched files
    #[arg(long, env = "OTA_SUFFIX", default_value = DEFAULT_SUFFIX)]
    suffix: String,

    /// Match the marker ignoring ASCII case
    #[arg(long)]
    ignore_marker_case: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ota_server=info,ota_core=info,tower_http=info".into()),
        )
        .init();

    let filter = AssetFilter::new(cli.marker, cli.suffix)
        .case_insensitive_marker(cli.ignore_marker_case);
    let core = OtaCore::new(OtaConfig {
        storage_dir: cli.storage_dir,
        rate: cli.bw_limit,
        fetcher: FetcherConfig {
            release_url: cli.release_url,
            filter,
            ..FetcherConfig::default()
        },
    })
    .await
    .context("failed to initialize storage")?;

    println!("[INFO] Serving firmware with bandwidth limit: {}", cli.bw_limit);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("OTA server listening on http://{}", addr);

    axum::serve(listener, routes::router(core))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("OTA server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ota-server"]).unwrap();
        assert_eq!(cli.bw_limit.kbps(), 128);
        assert_eq!(cli.port, 81);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.marker, "fpv");
        assert_eq!(cli.suffix, ".tgz");
        assert!(!cli.ignore_marker_case);
    }

    #[test]
    fn test_cli_rejects_non_positive_bandwidth() {
        assert!(Cli::try_parse_from(["ota-server", "--bw-limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["ota-server", "--bw-limit=-10"]).is_err());
        assert!(Cli::try_parse_from(["ota-server", "--bw-limit", "lots"]).is_err());

        let cli = Cli::try_parse_from(["ota-server", "--bw-limit", "512"]).unwrap();
        assert_eq!(cli.bw_limit.kbps(), 512);
    }
}

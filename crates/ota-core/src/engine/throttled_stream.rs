//! Paced file streaming
//!
//! Turns an artifact on disk into a finite, single-pass stream of
//! fixed-size chunks. The file handle lives inside the stream state, so it
//! is closed when the stream is exhausted or dropped by the transport.

use crate::engine::rate_limiter::RateLimiter;
use crate::error::OtaError;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use ota_types::RateLimitConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Byte chunks of one artifact, emitted at the configured rate
pub struct ThrottledStream {
    inner: BoxStream<'static, io::Result<Vec<u8>>>,
}

impl std::fmt::Debug for ThrottledStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledStream").finish_non_exhaustive()
    }
}

impl Stream for ThrottledStream {
    type Item = io::Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Open `path` and stream it paced by `config`
pub async fn stream(path: &Path, config: RateLimitConfig) -> Result<ThrottledStream, OtaError> {
    stream_with(path, RateLimiter::for_config(config)).await
}

/// Open `path` and stream it with an explicit pacer
async fn stream_with(path: &Path, limiter: RateLimiter) -> Result<ThrottledStream, OtaError> {
    let file = File::open(path).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            OtaError::NotFound(path.display().to_string())
        } else {
            OtaError::Io(e)
        }
    })?;

    debug!(
        "Streaming {} at {:?} per {} byte chunk",
        path.display(),
        limiter.delay(),
        limiter.chunk_size()
    );

    let state = StreamState {
        path: path.to_path_buf(),
        file: Some(file),
        limiter,
        started: false,
        sent: 0,
        finished: false,
    };

    let inner = stream::unfold(state, |mut state| async move {
        let mut file = state.file.take()?;

        // the delay after the previous chunk is taken lazily, when the
        // consumer asks for more
        if state.started {
            state.limiter.pace().await;
        }
        state.started = true;

        let mut buf = vec![0u8; state.limiter.chunk_size()];
        match read_chunk(&mut file, &mut buf).await {
            Ok(0) => {
                state.finished = true;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                state.sent += n as u64;
                state.file = Some(file);
                Some((Ok(buf), state))
            }
            Err(e) => {
                warn!("Read error while streaming {}: {}", state.path.display(), e);
                state.finished = true;
                Some((Err(e), state))
            }
        }
    });

    Ok(ThrottledStream {
        inner: inner.boxed(),
    })
}

struct StreamState {
    path: PathBuf,
    file: Option<File>,
    limiter: RateLimiter,
    started: bool,
    sent: u64,
    finished: bool,
}

impl Drop for StreamState {
    fn drop(&mut self) {
        if self.finished {
            debug!("Finished streaming {} ({} bytes)", self.path.display(), self.sent);
        } else {
            debug!(
                "Stream of {} abandoned after {} bytes, closing file",
                self.path.display(),
                self.sent
            );
        }
    }
}

/// Fill `buf` from the file; a short count only happens at end of file
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

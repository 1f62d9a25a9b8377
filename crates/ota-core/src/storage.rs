//! Storage directory holding the served firmware archives

use crate::error::OtaError;
use ota_types::Artifact;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Directory of artifacts, listed fresh on every request
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    /// Data directory
    dir: PathBuf,
    /// Suffix a file needs to be listed
    suffix: String,
}

impl ArtifactStore {
    /// Open the storage directory, creating it if needed
    pub async fn new(dir: PathBuf, suffix: impl Into<String>) -> Result<Self, OtaError> {
        fs::create_dir_all(&dir).await?;

        Ok(Self {
            dir,
            suffix: suffix.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All archives in the directory, sorted by filename
    pub async fn list(&self) -> Result<Vec<Artifact>, OtaError> {
        let mut artifacts = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !filename.ends_with(&self.suffix) {
                continue;
            }
            let Ok(metadata) = fs::metadata(entry.path()).await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            artifacts.push(Artifact {
                filename,
                size: metadata.len(),
                path: entry.path(),
            });
        }

        artifacts.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(artifacts)
    }

    /// Resolve a client-supplied name to an existing file inside the
    /// directory. Anything that would leave the directory is `NotFound`.
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, OtaError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(OtaError::NotFound(name.to_string()));
        }

        let path = self.dir.join(relative);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            _ => Err(OtaError::NotFound(name.to_string())),
        }
    }

    /// Path a downloaded artifact is written to
    pub fn destination(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Scratch path for an in-flight download; never matches the suffix,
    /// so partial files are not listed
    pub fn partial_destination(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{filename}.part"))
    }
}

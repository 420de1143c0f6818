//! Job manifest persisted next to the staging stores.
//!
//! The manifest records what the staging stores were fetched for. Staging
//! data is only reused when a new run describes the same job.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::partition::ByteRange;
use crate::error::{FetchError, FetchResult};

/// Manifest file name inside the staging directory.
pub const MANIFEST_FILE_NAME: &str = "job.json";

const MANIFEST_VERSION: u32 = 1;

/// Description of the job a staging directory belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobManifest {
    /// Format version.
    pub version: u32,
    /// Resource address.
    pub url: String,
    /// Probed resource length.
    pub total_size: u64,
    /// Chunk ranges in assembly order.
    pub ranges: Vec<ByteRange>,
}

impl JobManifest {
    pub fn new(url: impl Into<String>, total_size: u64, ranges: Vec<ByteRange>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            url: url.into(),
            total_size,
            ranges,
        }
    }

    /// Location of the manifest in `staging_dir`.
    pub fn path_in(staging_dir: &Path) -> PathBuf {
        staging_dir.join(MANIFEST_FILE_NAME)
    }

    /// Whether staging data written for `self` is valid for `other`.
    pub fn matches(&self, other: &JobManifest) -> bool {
        self.version == other.version
            && self.url == other.url
            && self.total_size == other.total_size
            && self.ranges == other.ranges
    }

    /// Read the manifest from `staging_dir`, `None` if there is none.
    pub async fn load(staging_dir: &Path) -> FetchResult<Option<Self>> {
        let path = Self::path_in(staging_dir);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FetchError::Manifest {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        let manifest: Self =
            serde_json::from_str(&contents).map_err(|e| FetchError::Manifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        debug!(path = %path.display(), chunks = manifest.ranges.len(), "Loaded job manifest");
        Ok(Some(manifest))
    }

    /// Write the manifest to `staging_dir`, replacing any previous one.
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// a crash never leaves a truncated manifest behind.
    pub async fn save(&self, staging_dir: &Path) -> FetchResult<()> {
        let path = Self::path_in(staging_dir);
        let temp = staging_dir.join(format!("{}.tmp", MANIFEST_FILE_NAME));
        let manifest_error = |reason: String| FetchError::Manifest {
            path: path.clone(),
            reason,
        };

        let json = serde_json::to_string_pretty(self).map_err(|e| manifest_error(e.to_string()))?;
        fs::write(&temp, json)
            .await
            .map_err(|e| manifest_error(e.to_string()))?;
        fs::rename(&temp, &path)
            .await
            .map_err(|e| manifest_error(e.to_string()))?;
        Ok(())
    }

    /// Delete the manifest from `staging_dir`; a missing manifest is fine.
    pub async fn remove(staging_dir: &Path) -> FetchResult<()> {
        let path = Self::path_in(staging_dir);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FetchError::Manifest {
                path,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> JobManifest {
        JobManifest::new(
            "https://host/file",
            100,
            vec![
                ByteRange::inclusive(0, 32),
                ByteRange::inclusive(33, 65),
                ByteRange::inclusive(66, 99),
            ],
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        manifest().save(temp.path()).await.unwrap();

        let loaded = JobManifest::load(temp.path()).await.unwrap().unwrap();
        assert_eq!(loaded, manifest());
        assert!(!temp.path().join("job.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(JobManifest::load(temp.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_corrupt_is_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(MANIFEST_FILE_NAME), "{ not json").unwrap();

        let result = JobManifest::load(temp.path()).await;
        assert!(matches!(result, Err(FetchError::Manifest { .. })));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        manifest().save(temp.path()).await.unwrap();

        JobManifest::remove(temp.path()).await.unwrap();
        JobManifest::remove(temp.path()).await.unwrap();
        assert!(!JobManifest::path_in(temp.path()).exists());
    }

    #[test]
    fn test_matches_requires_same_job() {
        let base = manifest();
        assert!(base.matches(&manifest()));

        let mut resized = manifest();
        resized.total_size = 101;
        assert!(!base.matches(&resized));

        let mut moved = manifest();
        moved.url = "https://other/file".to_string();
        assert!(!base.matches(&moved));

        let repartitioned = JobManifest::new(
            "https://host/file",
            100,
            vec![ByteRange::inclusive(0, 49), ByteRange::inclusive(50, 99)],
        );
        assert!(!base.matches(&repartitioned));
    }
}

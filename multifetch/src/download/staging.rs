//! Durable per-chunk staging stores.
//!
//! A staging store is an append-only file whose length is the chunk's resume
//! cursor. Bytes are appended through a buffer and only count once
//! [`StagingStore::sync`] has pushed them to durable storage.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::{FetchError, FetchResult};

/// Write buffer for staging stores (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Append-only staging file for one chunk.
#[derive(Debug)]
pub struct StagingStore {
    path: PathBuf,
    writer: BufWriter<File>,
    durable_len: u64,
    buffered: u64,
}

impl StagingStore {
    /// Open an existing store or create an empty one.
    ///
    /// The durable length of a pre-existing store becomes the resume point.
    pub async fn open(path: &Path) -> FetchResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| storage_error(path, e))?;
        let durable_len = file
            .metadata()
            .await
            .map_err(|e| storage_error(path, e))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::with_capacity(BUFFER_SIZE, file),
            durable_len,
            buffered: 0,
        })
    }

    /// Path of the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes persisted by the last successful sync (or found at open).
    pub fn len(&self) -> u64 {
        self.durable_len
    }

    /// Whether nothing has been persisted yet.
    pub fn is_empty(&self) -> bool {
        self.durable_len == 0
    }

    /// Bytes appended but not yet synced.
    pub fn pending(&self) -> u64 {
        self.buffered
    }

    /// Append bytes. They are not durable until [`sync`](Self::sync).
    pub async fn append(&mut self, bytes: &[u8]) -> FetchResult<()> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        self.buffered += bytes.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes and sync them to durable storage.
    ///
    /// Returns the number of bytes that became durable.
    pub async fn sync(&mut self) -> FetchResult<u64> {
        self.writer
            .flush()
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_data()
            .await
            .map_err(|e| storage_error(&self.path, e))?;

        let synced = self.buffered;
        self.durable_len += synced;
        self.buffered = 0;
        Ok(synced)
    }

    /// Discard all content, including unsynced bytes.
    pub async fn reset(&mut self) -> FetchResult<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        let file = self.writer.get_ref();
        file.set_len(0)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        self.durable_len = 0;
        self.buffered = 0;
        Ok(())
    }

    /// Sync outstanding bytes and release the write handle.
    pub async fn close(mut self) -> FetchResult<u64> {
        self.sync().await?;
        let path = self.path.clone();
        let file = self.writer.into_inner();
        file.sync_all().await.map_err(|e| storage_error(&path, e))?;
        Ok(self.durable_len)
    }
}

/// Current length of the staging file at `path`, zero if absent.
pub async fn staged_len(path: &Path) -> FetchResult<u64> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(storage_error(path, e)),
    }
}

/// Delete the staging file at `path`; a missing file is not an error.
pub async fn remove_staging(path: &Path) -> FetchResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error(path, e)),
    }
}

fn storage_error(path: &Path, source: io::Error) -> FetchError {
    FetchError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_empty_store() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunk0.part");

        let store = StagingStore::open(&path).await.unwrap();
        assert!(store.is_empty());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_append_counts_only_after_sync() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunk0.part");

        let mut store = StagingStore::open(&path).await.unwrap();
        store.append(b"hello ").await.unwrap();
        store.append(b"world").await.unwrap();

        assert_eq!(store.len(), 0);
        assert_eq!(store.pending(), 11);

        assert_eq!(store.sync().await.unwrap(), 11);
        assert_eq!(store.len(), 11);
        assert_eq!(store.pending(), 0);
        assert_eq!(staged_len(&path).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_reopen_resumes_from_length() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunk3.part");

        let mut store = StagingStore::open(&path).await.unwrap();
        store.append(&[7u8; 1000]).await.unwrap();
        assert_eq!(store.close().await.unwrap(), 1000);

        let mut store = StagingStore::open(&path).await.unwrap();
        assert_eq!(store.len(), 1000);
        store.append(&[8u8; 24]).await.unwrap();
        store.close().await.unwrap();

        let content = std::fs::read(&path).unwrap();
        assert_eq!(content.len(), 1024);
        assert!(content[..1000].iter().all(|b| *b == 7));
        assert!(content[1000..].iter().all(|b| *b == 8));
    }

    #[tokio::test]
    async fn test_reset_discards_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunk1.part");

        let mut store = StagingStore::open(&path).await.unwrap();
        store.append(b"stale data").await.unwrap();
        store.sync().await.unwrap();
        store.append(b"unsynced").await.unwrap();

        store.reset().await.unwrap();
        assert_eq!(store.len(), 0);
        assert_eq!(store.pending(), 0);

        store.append(b"fresh").await.unwrap();
        store.close().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_staged_len_and_remove_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.part");

        assert_eq!(staged_len(&path).await.unwrap(), 0);
        remove_staging(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("chunk0.part");

        let result = StagingStore::open(&path).await;
        assert!(matches!(result, Err(FetchError::Storage { .. })));
    }
}

//! Ordered reassembly of staged chunks into the output artifact.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::manifest::JobManifest;
use super::staging::{remove_staging, staged_len};
use super::state::ChunkDescriptor;
use crate::error::{FetchError, FetchResult};

/// Write buffer for the output artifact (1MB).
const BUFFER_SIZE: usize = 1024 * 1024;

/// Concatenates staging stores, in chunk order, into one file.
#[derive(Debug, Clone)]
pub struct Assembler {
    output: PathBuf,
}

impl Assembler {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    /// Output artifact path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Check that every staging store holds exactly its chunk's bytes.
    pub async fn verify(&self, chunks: &[ChunkDescriptor]) -> FetchResult<()> {
        for chunk in chunks {
            let staged = staged_len(&chunk.staging).await?;
            if staged != chunk.len() {
                return Err(FetchError::IncompleteChunk {
                    chunk: chunk.index,
                    staged,
                    expected: chunk.len(),
                });
            }
        }
        Ok(())
    }

    /// Build the artifact from the staging stores.
    ///
    /// The output is created fresh, truncating any previous file. Staging
    /// stores are left in place; [`cleanup`](Self::cleanup) removes them once
    /// the caller is done with the artifact. On failure the partial artifact
    /// stays where it is.
    pub async fn assemble(&self, chunks: &[ChunkDescriptor]) -> FetchResult<u64> {
        self.verify(chunks).await?;

        let mut ordered: Vec<&ChunkDescriptor> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.index);

        let file = File::create(&self.output)
            .await
            .map_err(|e| self.assembly_error(e))?;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
        let mut written = 0u64;

        for chunk in ordered {
            if chunk.is_empty() {
                continue;
            }
            let mut staging = File::open(&chunk.staging)
                .await
                .map_err(|e| FetchError::Assembly {
                    path: chunk.staging.clone(),
                    source: e,
                })?;
            let copied = tokio::io::copy(&mut staging, &mut writer)
                .await
                .map_err(|e| self.assembly_error(e))?;
            if copied != chunk.len() {
                return Err(FetchError::IncompleteChunk {
                    chunk: chunk.index,
                    staged: copied,
                    expected: chunk.len(),
                });
            }
            debug!(chunk = chunk.index, bytes = copied, "Chunk appended to artifact");
            written += copied;
        }

        writer.flush().await.map_err(|e| self.assembly_error(e))?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| self.assembly_error(e))?;

        info!(output = %self.output.display(), bytes = written, "Artifact assembled");
        Ok(written)
    }

    /// Remove the staging stores, the manifest and, if empty, the staging
    /// directory.
    pub async fn cleanup(&self, chunks: &[ChunkDescriptor], staging_dir: &Path) -> FetchResult<()> {
        for chunk in chunks {
            remove_staging(&chunk.staging).await?;
        }
        JobManifest::remove(staging_dir).await?;

        match fs::remove_dir(staging_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            // Leftover files that are not ours; keep the directory.
            Err(e) => debug!(dir = %staging_dir.display(), error = %e, "Staging directory kept"),
        }
        Ok(())
    }

    fn assembly_error(&self, source: io::Error) -> FetchError {
        FetchError::Assembly {
            path: self.output.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::partition::{partition, ByteRange};
    use std::num::NonZeroUsize;
    use tempfile::TempDir;

    fn stage_all(dir: &Path, data: &[u8], chunks: usize) -> Vec<ChunkDescriptor> {
        let ranges = partition(data.len() as u64, NonZeroUsize::new(chunks).unwrap());
        let descriptors = ChunkDescriptor::for_ranges(&ranges, dir);
        for d in &descriptors {
            let start = d.range.start as usize;
            let end = d.range.end_exclusive() as usize;
            std::fs::write(&d.staging, &data[start..end]).unwrap();
        }
        descriptors
    }

    #[tokio::test]
    async fn test_assembles_in_order() {
        let temp = TempDir::new().unwrap();
        let data: Vec<u8> = (0..100u8).collect();
        let mut chunks = stage_all(temp.path(), &data, 3);
        chunks.reverse();
        let output = temp.path().join("out.bin");

        let written = Assembler::new(&output).assemble(&chunks).await.unwrap();

        assert_eq!(written, 100);
        assert_eq!(std::fs::read(&output).unwrap(), data);
    }

    #[tokio::test]
    async fn test_truncates_existing_output() {
        let temp = TempDir::new().unwrap();
        let data = b"0123456789".to_vec();
        let chunks = stage_all(temp.path(), &data, 4);
        let output = temp.path().join("out.bin");
        std::fs::write(&output, vec![b'x'; 500]).unwrap();

        Assembler::new(&output).assemble(&chunks).await.unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), data);
    }

    #[tokio::test]
    async fn test_incomplete_chunk_is_rejected() {
        let temp = TempDir::new().unwrap();
        let data: Vec<u8> = (0..100u8).collect();
        let chunks = stage_all(temp.path(), &data, 3);
        std::fs::write(&chunks[1].staging, &data[33..50]).unwrap();
        let output = temp.path().join("out.bin");

        let result = Assembler::new(&output).assemble(&chunks).await;

        match result {
            Err(FetchError::IncompleteChunk {
                chunk,
                staged,
                expected,
            }) => {
                assert_eq!((chunk, staged, expected), (1, 17, 33));
            }
            other => panic!("Expected IncompleteChunk, got {:?}", other),
        }
        // Staging data survives for a later attempt.
        assert!(chunks[0].staging.exists());
    }

    #[tokio::test]
    async fn test_empty_resource() {
        let temp = TempDir::new().unwrap();
        let ranges = vec![ByteRange::new(0, 0), ByteRange::new(0, 0)];
        let chunks = ChunkDescriptor::for_ranges(&ranges, temp.path());
        let output = temp.path().join("empty.bin");

        let written = Assembler::new(&output).assemble(&chunks).await.unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_staging() {
        let temp = TempDir::new().unwrap();
        let staging_dir = temp.path().join(".out.bin.parts");
        std::fs::create_dir(&staging_dir).unwrap();
        let data: Vec<u8> = (0..50u8).collect();
        let chunks = stage_all(&staging_dir, &data, 2);
        JobManifest::new("https://host/out.bin", 50, chunks.iter().map(|c| c.range).collect())
            .save(&staging_dir)
            .await
            .unwrap();

        let assembler = Assembler::new(temp.path().join("out.bin"));
        assembler.assemble(&chunks).await.unwrap();
        assembler.cleanup(&chunks, &staging_dir).await.unwrap();

        assert!(!staging_dir.exists());
        assert_eq!(std::fs::read(assembler.output()).unwrap(), data);
    }
}

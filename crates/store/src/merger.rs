//! Ordered, resource-bounded reconstruction of a file from its chunks.
//!
//! Chunks are concatenated in ascending numeric index order into a staging
//! file. Exactly one chunk reader is open at any moment: each reader is
//! drained completely and dropped before the next one is opened. The
//! staging file is renamed to `merged/<fingerprint>/<file name>` only after
//! it has been synced; on any fault it is removed, so no partial artifact
//! ever appears at the merged key.

use std::collections::BTreeSet;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bigfile_transfer::{Fingerprint, validate_file_name};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::chunk_store::{ChunkStore, discard};
use crate::error::StoreError;
use crate::layout::{Layout, StagingKind, dir_exists};

/// Readable bytes of one stored chunk.
pub type ChunkStream = Box<dyn AsyncRead + Send + Unpin>;

/// Where the merger reads chunks from.
///
/// Implemented by [`ChunkStore`]; tests substitute doubles to observe how
/// many readers are open at once.
pub trait ChunkSource: Send + Sync {
    /// Stored indices for `fp`, or `None` if it has no chunk scope.
    fn chunk_indices<'a>(
        &'a self,
        fp: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BTreeSet<u32>>, StoreError>> + Send + 'a>>;

    /// Opens one chunk for reading.
    fn open_chunk<'a>(
        &'a self,
        fp: &'a Fingerprint,
        index: u32,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, StoreError>> + Send + 'a>>;
}

impl ChunkSource for ChunkStore {
    fn chunk_indices<'a>(
        &'a self,
        fp: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BTreeSet<u32>>, StoreError>> + Send + 'a>> {
        Box::pin(self.scope_indices(fp))
    }

    fn open_chunk<'a>(
        &'a self,
        fp: &'a Fingerprint,
        index: u32,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkStream, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let file = ChunkStore::open_chunk(self, fp, index).await?;
            Ok(Box::new(file) as ChunkStream)
        })
    }
}

/// Result of a successful merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Size of the merged file in bytes.
    pub size: u64,
    /// Number of chunks concatenated (0 if the file was already merged).
    pub chunk_count: u32,
    /// True if the merged file already existed and nothing was written.
    pub already_merged: bool,
}

/// Concatenates a fingerprint's chunks into its merged file.
pub struct Merger<S> {
    layout: Layout,
    source: S,
}

impl<S: ChunkSource> Merger<S> {
    /// Creates a merger writing under the upload root `root`.
    pub fn new(root: impl Into<PathBuf>, source: S) -> Self {
        Self {
            layout: Layout::new(root),
            source,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Merges the chunks of `fp` into `merged/<fp>/<file_name>`.
    ///
    /// With `expected_total = Some(n)`, the stored set must be exactly
    /// `0..n`; gaps fail with [`StoreError::Incomplete`] and extra indices
    /// with [`StoreError::UnexpectedChunks`], before anything is written.
    /// Without it, whatever chunks are stored are concatenated.
    pub async fn merge(
        &self,
        fp: &Fingerprint,
        file_name: &str,
        expected_total: Option<u32>,
    ) -> Result<MergeOutcome, StoreError> {
        validate_file_name(file_name)?;

        let target = self.layout.merged_path(fp, file_name);
        if let Some(size) = existing_file_size(&target).await? {
            info!(fingerprint = %fp, file = file_name, size, "already merged");
            return Ok(MergeOutcome {
                size,
                chunk_count: 0,
                already_merged: true,
            });
        }

        let indices = match self.source.chunk_indices(fp).await? {
            Some(indices) if !indices.is_empty() => indices,
            _ => return Err(StoreError::NoChunks(fp.to_string())),
        };
        if let Some(expected) = expected_total {
            verify_complete(&indices, expected)?;
        }

        let staging = self.layout.staging_path(StagingKind::Merge);
        let size = match self.concatenate(fp, &indices, &staging).await {
            Ok(size) => size,
            Err(e) => {
                warn!(fingerprint = %fp, error = %e, "merge failed, discarding output");
                discard(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = self.publish(fp, &staging, &target).await {
            warn!(fingerprint = %fp, error = %e, "publishing merged file failed");
            discard(&staging).await;
            return Err(e);
        }

        let chunk_count = indices.len() as u32;
        info!(fingerprint = %fp, file = file_name, size, chunk_count, "merge complete");
        Ok(MergeOutcome {
            size,
            chunk_count,
            already_merged: false,
        })
    }

    async fn concatenate(
        &self,
        fp: &Fingerprint,
        indices: &BTreeSet<u32>,
        staging: &Path,
    ) -> Result<u64, StoreError> {
        let mut out = tokio::fs::File::create(staging).await?;
        let mut size = 0u64;

        for &index in indices {
            let mut reader = self.source.open_chunk(fp, index).await?;
            let copied = tokio::io::copy(&mut reader, &mut out).await?;
            // Release before the next chunk is opened.
            drop(reader);
            size += copied;
            debug!(fingerprint = %fp, index, bytes = copied, "chunk appended");
        }

        out.flush().await?;
        out.sync_all().await?;
        Ok(size)
    }

    /// Moves the finished staging file to its merged key.
    async fn publish(&self, fp: &Fingerprint, staging: &Path, target: &Path) -> Result<(), StoreError> {
        let dir = self.layout.merged_dir(fp);
        let created = !dir_exists(&dir).await?;
        tokio::fs::create_dir_all(&dir).await?;

        if let Err(e) = tokio::fs::rename(staging, target).await {
            if created {
                // Only removes the directory if it is still empty.
                if let Err(cleanup) = tokio::fs::remove_dir(&dir).await {
                    warn!(path = %dir.display(), error = %cleanup, "failed to remove merged directory");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Checks that `indices` is exactly `0..expected`.
fn verify_complete(indices: &BTreeSet<u32>, expected: u32) -> Result<(), StoreError> {
    let surplus: Vec<u32> = indices.range(expected..).copied().collect();
    if !surplus.is_empty() {
        return Err(StoreError::UnexpectedChunks { expected, surplus });
    }
    let missing: Vec<u32> = (0..expected).filter(|i| !indices.contains(i)).collect();
    if !missing.is_empty() {
        return Err(StoreError::Incomplete { expected, missing });
    }
    Ok(())
}

async fn existing_file_size(path: &Path) -> Result<Option<u64>, StoreError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Err(StoreError::InvalidInput(format!(
            "merge target is not a file: {}",
            path.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

//! Chunk persistence keyed by `(fingerprint, index)`.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use bigfile_transfer::Fingerprint;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::layout::{Layout, StagingKind};

/// Persists chunks under `chunks/<fingerprint>/<index>`.
///
/// Each write lands in the staging directory first and is renamed into
/// place, so distinct indices never share a file and a failed write never
/// leaves a torn chunk behind.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    layout: Layout,
}

impl ChunkStore {
    pub(crate) fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Stores `bytes` as chunk `index` and returns how many distinct
    /// indices are now stored for `fp`.
    ///
    /// Re-putting an index replaces it (last writer wins).
    pub async fn put(&self, fp: &Fingerprint, index: u32, bytes: &[u8]) -> Result<u32, StoreError> {
        self.ensure_scope(fp).await?;

        let staging = self.layout.staging_path(StagingKind::Chunk);
        if let Err(e) = write_staged(&staging, bytes).await {
            discard(&staging).await;
            return Err(e.into());
        }

        let target = self.layout.chunk_path(fp, index);
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            discard(&staging).await;
            return Err(e.into());
        }

        let count = self.indices(fp).await?.len() as u32;
        debug!(fingerprint = %fp, index, size = bytes.len(), count, "chunk stored");
        Ok(count)
    }

    /// Indices currently stored for `fp`. Empty if the scope doesn't exist.
    pub async fn indices(&self, fp: &Fingerprint) -> Result<BTreeSet<u32>, StoreError> {
        Ok(self.scope_indices(fp).await?.unwrap_or_default())
    }

    /// Indices stored for `fp`, or `None` if no chunk scope exists.
    ///
    /// Entries whose names aren't a canonical decimal `u32` are skipped.
    pub async fn scope_indices(
        &self,
        fp: &Fingerprint,
    ) -> Result<Option<BTreeSet<u32>>, StoreError> {
        let dir = self.layout.chunk_dir(fp);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut indices = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(index) = name.to_str().and_then(parse_entry_name) {
                indices.insert(index);
            }
        }
        Ok(Some(indices))
    }

    /// Opens chunk `index` for reading.
    pub async fn open_chunk(
        &self,
        fp: &Fingerprint,
        index: u32,
    ) -> Result<tokio::fs::File, StoreError> {
        Ok(tokio::fs::File::open(self.layout.chunk_path(fp, index)).await?)
    }

    /// Deletes every chunk stored for `fp`. A missing scope is not an error.
    pub async fn remove_scope(&self, fp: &Fingerprint) -> Result<(), StoreError> {
        match tokio::fs::remove_dir_all(self.layout.chunk_dir(fp)).await {
            Ok(()) => {
                info!(fingerprint = %fp, "chunk scope removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_scope(&self, fp: &Fingerprint) -> Result<(), StoreError> {
        let dir = self.layout.chunk_dir(fp);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {
                info!(fingerprint = %fp, "chunk scope created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&dir).await?;
                info!(fingerprint = %fp, "chunk scope created");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_entry_name(name: &str) -> Option<u32> {
    let index = name.parse::<u32>().ok()?;
    (index.to_string() == name).then_some(index)
}

async fn write_staged(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Best-effort removal of a staging file.
pub(crate) async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staging file"),
    }
}

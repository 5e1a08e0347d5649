//! Server-side storage for resumable uploads.
//!
//! [`BigFileStore`] ties together the [`ChunkStore`] (per-chunk
//! persistence), the [`ResumeNegotiator`] (`check`) and the [`Merger`]
//! over one upload root directory.

mod chunk_store;
mod error;
mod layout;
mod merger;
mod negotiator;

use std::path::{Path, PathBuf};

use bigfile_transfer::Fingerprint;
use tracing::{info, warn};

pub use chunk_store::ChunkStore;
pub use error::StoreError;
pub use merger::{ChunkSource, ChunkStream, MergeOutcome, Merger};
pub use negotiator::{ChunkStatus, ResumeNegotiator};

use layout::Layout;

/// Options for [`BigFileStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Delete a fingerprint's chunks once its merge succeeds.
    pub remove_chunks_after_merge: bool,
}

/// Chunk store, negotiator and merger sharing one upload root.
pub struct BigFileStore {
    root: PathBuf,
    chunks: ChunkStore,
    negotiator: ResumeNegotiator,
    merger: Merger<ChunkStore>,
    options: StoreOptions,
}

impl BigFileStore {
    /// Opens (creating if needed) the upload root at `root`.
    pub async fn open(root: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, StoreError> {
        let root = root.into();
        let layout = Layout::new(&root);
        layout.ensure().await?;

        let chunks = ChunkStore::new(layout.clone());
        let negotiator = ResumeNegotiator::new(layout, chunks.clone());
        let merger = Merger::new(&root, chunks.clone());

        info!(root = %root.display(), "upload store opened");
        Ok(Self {
            root,
            chunks,
            negotiator,
            merger,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub async fn check(&self, fp: &Fingerprint) -> Result<ChunkStatus, StoreError> {
        self.negotiator.check(fp).await
    }

    /// Stores one chunk; returns the number of distinct chunks now stored.
    pub async fn put_chunk(
        &self,
        fp: &Fingerprint,
        index: u32,
        bytes: &[u8],
    ) -> Result<u32, StoreError> {
        self.chunks.put(fp, index, bytes).await
    }

    /// Merges the chunks of `fp` into `file_name`.
    ///
    /// See [`Merger::merge`] for how `expected_total` is enforced.
    pub async fn merge(
        &self,
        fp: &Fingerprint,
        file_name: &str,
        expected_total: Option<u32>,
    ) -> Result<MergeOutcome, StoreError> {
        let outcome = self.merger.merge(fp, file_name, expected_total).await?;

        if self.options.remove_chunks_after_merge && !outcome.already_merged {
            if let Err(e) = self.chunks.remove_scope(fp).await {
                warn!(fingerprint = %fp, error = %e, "failed to remove merged chunks");
            }
        }
        Ok(outcome)
    }
}

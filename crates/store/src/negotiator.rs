//! Resume negotiation: what does the server already hold for a fingerprint?

use std::collections::BTreeSet;

use bigfile_transfer::Fingerprint;
use tracing::debug;

use crate::chunk_store::ChunkStore;
use crate::error::StoreError;
use crate::layout::{Layout, dir_has_entries};

/// Storage state of one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Neither a merged file nor any chunk exists.
    Absent,
    /// A merged file exists under some name.
    Complete,
    /// No merged file yet; these chunk indices are stored.
    PartiallyStored(BTreeSet<u32>),
}

#[derive(Debug, Clone)]
pub struct ResumeNegotiator {
    layout: Layout,
    chunks: ChunkStore,
}

impl ResumeNegotiator {
    pub(crate) fn new(layout: Layout, chunks: ChunkStore) -> Self {
        Self { layout, chunks }
    }

    /// Reports the storage state of `fp`.
    ///
    /// Completeness is decided at the fingerprint directory level, so any
    /// merged name counts. An empty merged directory left by a failed
    /// publish does not. Storage faults propagate instead of reading as
    /// `Absent`.
    pub async fn check(&self, fp: &Fingerprint) -> Result<ChunkStatus, StoreError> {
        if dir_has_entries(&self.layout.merged_dir(fp)).await? {
            debug!(fingerprint = %fp, "check: complete");
            return Ok(ChunkStatus::Complete);
        }

        let indices = self.chunks.indices(fp).await?;
        if indices.is_empty() {
            debug!(fingerprint = %fp, "check: absent");
            Ok(ChunkStatus::Absent)
        } else {
            debug!(fingerprint = %fp, stored = indices.len(), "check: partially stored");
            Ok(ChunkStatus::PartiallyStored(indices))
        }
    }
}

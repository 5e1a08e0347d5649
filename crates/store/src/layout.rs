//! On-disk layout of the upload root.
//!
//! ```text
//! <root>/chunks/<fingerprint>/<index>
//! <root>/merged/<fingerprint>/<file name>
//! <root>/staging/<uuid>.<kind>
//! ```

use std::path::{Path, PathBuf};

use bigfile_transfer::Fingerprint;

const CHUNKS_DIR: &str = "chunks";
const MERGED_DIR: &str = "merged";
const STAGING_DIR: &str = "staging";

/// Kind of in-flight write, used as the staging file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StagingKind {
    Chunk,
    Merge,
}

impl StagingKind {
    fn extension(self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Merge => "merge",
        }
    }
}

/// Resolves storage paths under one root directory.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    root: PathBuf,
}

impl Layout {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the three top-level directories if missing.
    pub(crate) async fn ensure(&self) -> std::io::Result<()> {
        for dir in [CHUNKS_DIR, MERGED_DIR, STAGING_DIR] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    pub(crate) fn chunk_dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(CHUNKS_DIR).join(fp.as_str())
    }

    pub(crate) fn chunk_path(&self, fp: &Fingerprint, index: u32) -> PathBuf {
        self.chunk_dir(fp).join(index.to_string())
    }

    pub(crate) fn merged_dir(&self, fp: &Fingerprint) -> PathBuf {
        self.root.join(MERGED_DIR).join(fp.as_str())
    }

    /// `file_name` must already be validated as a single component.
    pub(crate) fn merged_path(&self, fp: &Fingerprint, file_name: &str) -> PathBuf {
        self.merged_dir(fp).join(file_name)
    }

    /// A fresh, unique path in the staging directory.
    pub(crate) fn staging_path(&self, kind: StagingKind) -> PathBuf {
        self.root.join(STAGING_DIR).join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            kind.extension()
        ))
    }
}

/// Returns true if `path` exists as a directory. Missing is `Ok(false)`.
pub(crate) async fn dir_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// `true` if `path` is a directory holding at least one entry.
pub(crate) async fn dir_has_entries(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

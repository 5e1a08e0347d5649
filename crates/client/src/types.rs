//! Configuration, events and outcomes of an upload.

use std::time::Duration;

use bigfile_transfer::{DEFAULT_CHUNK_SIZE, Fingerprint};

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Chunk size in bytes; 0 falls back to 1 MiB.
    pub chunk_size: u64,
    /// Maximum chunk uploads in flight.
    pub concurrency: usize,
    /// Extra attempts per chunk, and extra rounds for chunks still missing.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Progress event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Fingerprinting progress, 0-100.
    Hashing { percent: u8 },
    /// Server state is known.
    Checked {
        fingerprint: Fingerprint,
        missing: u32,
        total: u32,
    },
    /// One chunk was acknowledged. `progress` is `uploaded / total`.
    ChunkUploaded {
        index: u32,
        uploaded: u32,
        total: u32,
        progress: f64,
    },
    /// A chunk gave up after its retries; it will be retried next round.
    ChunkFailed { index: u32, error: String },
    /// The server produced the merged file.
    Merged { size: u64 },
}

/// How an upload finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The server already had the merged file; nothing was sent.
    AlreadyStored { fingerprint: Fingerprint },
    /// Chunks were sent (possibly none, if all were already stored) and merged.
    Uploaded {
        fingerprint: Fingerprint,
        chunks_sent: u32,
        chunk_count: u32,
        size: u64,
    },
}

impl UploadOutcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::AlreadyStored { fingerprint } | Self::Uploaded { fingerprint, .. } => fingerprint,
        }
    }
}

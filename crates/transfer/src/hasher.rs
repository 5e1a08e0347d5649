use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use md5::{Digest, Md5};
use tokio::sync::mpsc;
use tracing::debug;

use crate::TransferError;
use crate::chunked::ChunkReader;

/// Length of a fingerprint in hex characters (MD5).
const FINGERPRINT_HEX_LEN: usize = 32;

/// Content fingerprint of a file: lowercase hex MD5 over its chunk bytes
/// concatenated in index order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parses a fingerprint received from outside (32 hex chars, any case).
    pub fn parse(s: &str) -> Result<Self, TransferError> {
        if s.len() != FINGERPRINT_HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TransferError::InvalidFingerprint(format!(
                "expected {FINGERPRINT_HEX_LEN} hex characters, got {s:?}"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Incremental hashing
// ---------------------------------------------------------------------------

/// Folds chunks, in the order given, into a running digest.
#[derive(Default, Clone)]
pub struct ChunkHasher {
    digest: Md5,
    chunks: u32,
}

impl ChunkHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the next chunk's bytes in.
    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
        self.chunks += 1;
    }

    /// Number of chunks folded in so far.
    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.digest.finalize()))
    }
}

/// Computes the fingerprint of an in-memory chunk sequence.
pub fn fingerprint_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Fingerprint {
    let mut hasher = ChunkHasher::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finish()
}

// ---------------------------------------------------------------------------
// Background file hashing
// ---------------------------------------------------------------------------

/// Message sent by a background hasher.
///
/// Zero or more `Progress` messages are followed by exactly one terminal
/// `Finished` or `Failed`.
#[derive(Debug)]
pub enum HashEvent {
    /// Percentage (0-100) of chunks folded in so far.
    Progress(u8),
    Finished(Fingerprint),
    Failed(TransferError),
}

/// Receiving side of a background hasher.
pub struct HashHandle {
    events: mpsc::Receiver<HashEvent>,
}

impl HashHandle {
    /// Receives the next event. `None` once the hasher has exited.
    pub async fn recv(&mut self) -> Option<HashEvent> {
        self.events.recv().await
    }

    /// Drains progress events into `on_progress` until the fingerprint arrives.
    pub async fn wait(mut self, mut on_progress: impl FnMut(u8)) -> Result<Fingerprint, TransferError> {
        while let Some(event) = self.events.recv().await {
            match event {
                HashEvent::Progress(percent) => on_progress(percent),
                HashEvent::Finished(fingerprint) => return Ok(fingerprint),
                HashEvent::Failed(e) => return Err(e),
            }
        }
        Err(TransferError::HasherStopped)
    }
}

/// Hashes the file at `path` on a separate task, chunk by chunk.
///
/// Memory use is bounded by one chunk. The task stops early if the
/// handle is dropped.
pub fn spawn_file_hasher(path: PathBuf, chunk_size: u64) -> HashHandle {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let terminal = match hash_file(&path, chunk_size, &tx).await {
            Ok(Some(fingerprint)) => HashEvent::Finished(fingerprint),
            Ok(None) => return,
            Err(e) => HashEvent::Failed(e),
        };
        let _ = tx.send(terminal).await;
    });
    HashHandle { events: rx }
}

/// Returns `Ok(None)` when the receiver went away mid-hash.
async fn hash_file(
    path: &std::path::Path,
    chunk_size: u64,
    tx: &mpsc::Sender<HashEvent>,
) -> Result<Option<Fingerprint>, TransferError> {
    let mut reader = ChunkReader::open(path, chunk_size).await?;
    let total = reader.slicer().chunk_count();
    let mut hasher = ChunkHasher::new();

    while let Some(chunk) = reader.next_chunk().await? {
        hasher.update(&chunk.data);
        let percent = progress_percent(hasher.chunks(), total);
        if tx.send(HashEvent::Progress(percent)).await.is_err() {
            return Ok(None);
        }
    }

    if total == 0 && tx.send(HashEvent::Progress(100)).await.is_err() {
        return Ok(None);
    }

    let fingerprint = hasher.finish();
    debug!(path = %path.display(), chunks = total, %fingerprint, "file hashed");
    Ok(Some(fingerprint))
}

fn progress_percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    (u64::from(done) * 100).div_ceil(u64::from(total)) as u8
}

//! Slicing, fingerprinting and chunk reading for resumable uploads.
//!
//! Shared by the uploading client and the storing server: both agree on
//! how a file is cut into chunks ([`Slicer`]), how its content is
//! identified ([`Fingerprint`]), and which identifying inputs are valid.

mod chunked;
mod hasher;
mod slicer;
mod validation;

pub use chunked::{Chunk, ChunkReader};
pub use hasher::{
    ChunkHasher, Fingerprint, HashEvent, HashHandle, fingerprint_chunks, spawn_file_hasher,
};
pub use slicer::{ChunkRange, Slicer};
pub use validation::{parse_chunk_index, parse_chunk_total, validate_file_name};

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid chunk index: {0}")]
    InvalidIndex(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("{file_size} bytes at {chunk_size} bytes per chunk needs more than u32::MAX chunks")]
    TooManyChunks { file_size: u64, chunk_size: u64 },

    #[error("hasher stopped before producing a fingerprint")]
    HasherStopped,
}

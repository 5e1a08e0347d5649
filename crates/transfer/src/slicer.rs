use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// One byte range of a file, identified by its position in the chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRange {
    /// Zero-based chunk index (`offset / chunk_size`).
    pub index: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Length in bytes; only the last range may be shorter than the chunk size.
    pub len: u64,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Partitions a file of known size into fixed-size chunk ranges.
///
/// A pure function of `(file_size, chunk_size)`; no I/O. Iterating twice
/// yields the same ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slicer {
    file_size: u64,
    chunk_size: u64,
    chunk_count: u32,
}

impl Slicer {
    /// Creates a slicer.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (1 MiB) is used.
    /// Fails with [`TransferError::TooManyChunks`] when the file would need
    /// more chunks than a `u32` index can address.
    pub fn new(file_size: u64, chunk_size: u64) -> Result<Self, TransferError> {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        let chunk_count = u32::try_from(file_size.div_ceil(chunk_size))
            .map_err(|_| TransferError::TooManyChunks {
                file_size,
                chunk_size,
            })?;
        Ok(Self {
            file_size,
            chunk_size,
            chunk_count,
        })
    }

    /// Number of chunks for a file: `ceil(file_size / chunk_size)`.
    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Returns the range for `index`, or `None` past the last chunk.
    pub fn range(&self, index: u32) -> Option<ChunkRange> {
        if index >= self.chunk_count() {
            return None;
        }
        let offset = u64::from(index) * self.chunk_size;
        let len = self.chunk_size.min(self.file_size - offset);
        Some(ChunkRange { index, offset, len })
    }

    /// Lazily yields every range in index order.
    pub fn ranges(&self) -> impl Iterator<Item = ChunkRange> + use<> {
        let slicer = *self;
        (0..slicer.chunk_count()).filter_map(move |index| slicer.range(index))
    }
}

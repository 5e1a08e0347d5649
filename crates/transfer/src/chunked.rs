use std::io::SeekFrom;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::slicer::{ChunkRange, Slicer};

/// The bytes of one chunk, read from a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub range: ChunkRange,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn index(&self) -> u32 {
        self.range.index
    }
}

/// Reads a local file one chunk at a time.
///
/// At most one chunk's bytes are held in memory per call.
pub struct ChunkReader {
    file: tokio::fs::File,
    slicer: Slicer,
    next_index: u32,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`](crate::DEFAULT_CHUNK_SIZE) is used.
    pub async fn open(path: &Path, chunk_size: u64) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let file_size = file.metadata().await?.len();
        Ok(Self {
            file,
            slicer: Slicer::new(file_size, chunk_size)?,
            next_index: 0,
        })
    }

    /// The slicer describing this file's chunk layout.
    pub fn slicer(&self) -> &Slicer {
        &self.slicer
    }

    /// Reads the chunk for `range` from its exact offset.
    pub async fn read_range(&mut self, range: ChunkRange) -> Result<Chunk, TransferError> {
        self.file.seek(SeekFrom::Start(range.offset)).await?;
        let mut data = vec![0u8; range.len as usize];
        self.file.read_exact(&mut data).await?;
        Ok(Chunk { range, data })
    }

    /// Reads the chunk at `index`, or `None` past the last chunk.
    pub async fn read_index(&mut self, index: u32) -> Result<Option<Chunk>, TransferError> {
        match self.slicer.range(index) {
            Some(range) => Ok(Some(self.read_range(range).await?)),
            None => Ok(None),
        }
    }

    /// Reads the next chunk in index order. Returns `None` after the last one.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let chunk = self.read_index(self.next_index).await?;
        if chunk.is_some() {
            self.next_index += 1;
        }
        Ok(chunk)
    }
}

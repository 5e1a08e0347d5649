//! Store error types.

use bigfile_transfer::TransferError;

/// Errors produced by the chunk store, negotiator and merger.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no chunks stored for {0}")]
    NoChunks(String),

    #[error("incomplete chunk set: expected {expected} chunks, missing {missing:?}")]
    Incomplete { expected: u32, missing: Vec<u32> },

    #[error("unexpected chunks beyond declared total {expected}: {surplus:?}")]
    UnexpectedChunks { expected: u32, surplus: Vec<u32> },
}

impl StoreError {
    /// True for faults caused by the caller's request rather than storage.
    pub fn is_input_fault(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    /// True if retrying the same operation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl From<TransferError> for StoreError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(io) => Self::Io(io),
            other => Self::InvalidInput(other.to_string()),
        }
    }
}

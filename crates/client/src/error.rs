//! Client error types.

use bigfile_protocol::ResultError;
use bigfile_protocol::constants::RESULT_FAILED;
use bigfile_transfer::TransferError;

/// Errors produced while uploading a file.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("server returned no result data")]
    EmptyResponse,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("chunk {index} failed: {source}")]
    Chunk {
        index: u32,
        #[source]
        source: Box<ClientError>,
    },

    #[error("chunks still missing after {rounds} rounds: {missing:?}")]
    Incomplete { rounds: u32, missing: Vec<u32> },

    #[error("merge failed: {0}")]
    Merge(#[source] Box<ClientError>),

    #[error("upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

impl From<ResultError> for ClientError {
    fn from(e: ResultError) -> Self {
        Self::Server {
            code: e.code,
            message: e.message,
        }
    }
}

impl ClientError {
    /// True for transient faults worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Server { code, .. } => *code == RESULT_FAILED,
            _ => false,
        }
    }
}

//! Transport seam between the orchestrator and the server.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use bigfile_protocol::{CheckResponse, CheckStatus, MergeResponse};
use bigfile_transfer::Fingerprint;

use crate::error::ClientError;

/// What the server holds for a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Absent,
    Complete,
    PartiallyStored(BTreeSet<u32>),
}

impl RemoteStatus {
    /// Indices in `0..total` the server does not hold yet.
    pub fn missing(&self, total: u32) -> Vec<u32> {
        match self {
            Self::Absent => (0..total).collect(),
            Self::Complete => Vec::new(),
            Self::PartiallyStored(stored) => (0..total).filter(|i| !stored.contains(i)).collect(),
        }
    }
}

impl From<CheckResponse> for RemoteStatus {
    fn from(resp: CheckResponse) -> Self {
        match resp.status {
            CheckStatus::Absent => Self::Absent,
            CheckStatus::Complete => Self::Complete,
            CheckStatus::PartiallyStored => Self::PartiallyStored(resp.data.into_iter().collect()),
        }
    }
}

/// One chunk upload request.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub fingerprint: Fingerprint,
    pub file_name: String,
    pub total: u32,
    pub index: u32,
    pub data: Vec<u8>,
}

/// Abstract connection to an upload server.
///
/// [`HttpTransport`](crate::HttpTransport) is the production
/// implementation; tests use in-memory mocks.
pub trait UploadTransport: Send + Sync {
    /// Asks the server what it already holds for `fp`.
    fn check<'a>(
        &'a self,
        fp: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteStatus, ClientError>> + Send + 'a>>;

    /// Sends one chunk. Returns the server's running count of stored chunks.
    fn upload_chunk<'a>(
        &'a self,
        chunk: &'a ChunkUpload,
    ) -> Pin<Box<dyn Future<Output = Result<u32, ClientError>> + Send + 'a>>;

    /// Asks the server to merge `total` chunks into `file_name`.
    fn merge<'a>(
        &'a self,
        fp: &'a Fingerprint,
        file_name: &'a str,
        total: u32,
    ) -> Pin<Box<dyn Future<Output = Result<MergeResponse, ClientError>> + Send + 'a>>;
}

//! Client side of resumable big-file uploads.
//!
//! [`UploadOrchestrator`] drives an upload through any
//! [`UploadTransport`]; [`HttpTransport`] is the HTTP implementation.

mod error;
mod http;
mod orchestrator;
mod transport;
mod types;

pub use error::ClientError;
pub use http::HttpTransport;
pub use orchestrator::UploadOrchestrator;
pub use transport::{ChunkUpload, RemoteStatus, UploadTransport};
pub use types::{UploadEvent, UploadOutcome, UploaderConfig};

//! Wire types for the resumable big-file upload endpoints.
//!
//! Every response is wrapped in a [`JsonResult`] envelope; the payload
//! types for each endpoint live in [`messages`].

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{JsonResult, ResultError};
pub use messages::{
    CheckParams, CheckResponse, MergeParams, MergeResponse, UploadResponse,
};
pub use types::{CheckStatus, UnknownCheckStatus};

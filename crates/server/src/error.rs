//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bigfile_protocol::JsonResult;
use bigfile_protocol::constants::{
    RESULT_FAILED, RESULT_INCOMPLETE, RESULT_INVALID_INPUT, RESULT_NO_CHUNKS,
};
use bigfile_store::StoreError;
use bigfile_transfer::TransferError;
use tracing::{debug, warn};

/// Errors returned by the upload handlers.
///
/// Always rendered as a [`JsonResult`] envelope with a non-zero code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(io) => Self::Store(StoreError::Io(io)),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Store(StoreError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(StoreError::NoChunks(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Incomplete { .. } | StoreError::UnexpectedChunks { .. }) => {
                StatusCode::CONFLICT
            }
            Self::Store(StoreError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True if the request itself was at fault.
    pub fn is_input_fault(&self) -> bool {
        match self {
            Self::BadRequest(_) => true,
            Self::Store(e) => e.is_input_fault(),
        }
    }

    /// True if the client may resend the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BadRequest(_) => false,
            Self::Store(e) => e.is_retryable(),
        }
    }

    /// Result code carried in the envelope.
    pub fn code(&self) -> i32 {
        match self {
            Self::BadRequest(_) | Self::Store(StoreError::InvalidInput(_)) => RESULT_INVALID_INPUT,
            Self::Store(StoreError::NoChunks(_)) => RESULT_NO_CHUNKS,
            Self::Store(StoreError::Incomplete { .. } | StoreError::UnexpectedChunks { .. }) => {
                RESULT_INCOMPLETE
            }
            Self::Store(StoreError::Io(_)) => RESULT_FAILED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_input_fault() {
            debug!(error = %self, %status, "request rejected");
        } else {
            warn!(error = %self, %status, retryable = self.is_retryable(), "request failed");
        }
        let body = JsonResult::<()>::failure(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

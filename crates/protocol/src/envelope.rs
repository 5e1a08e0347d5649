use serde::{Deserialize, Serialize};

use crate::constants::RESULT_OK;

/// Response envelope shared by every endpoint.
///
/// `result_code == 0` means success; any other value is a fault and
/// `message` carries a human-readable description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonResult<T> {
    pub result_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_data: Option<T>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// A non-zero result code reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("server returned code {code}: {message}")]
pub struct ResultError {
    pub code: i32,
    pub message: String,
}

impl<T> JsonResult<T> {
    /// Creates a successful envelope carrying `data`.
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            result_code: RESULT_OK,
            result_data: Some(data),
            message: message.into(),
        }
    }

    /// Creates a failure envelope without payload.
    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            result_code: code,
            result_data: None,
            message: message.into(),
        }
    }

    /// Returns `true` if the result code signals success.
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_OK
    }

    /// Converts the envelope into its payload, or the reported fault.
    pub fn into_result(self) -> Result<Option<T>, ResultError> {
        if self.is_success() {
            Ok(self.result_data)
        } else {
            Err(ResultError {
                code: self.result_code,
                message: self.message,
            })
        }
    }
}

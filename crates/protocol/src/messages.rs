use serde::{Deserialize, Serialize};

use crate::types::CheckStatus;

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Query parameters of a check request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckParams {
    pub file_md5: String,
}

/// Payload of a check response.
///
/// `data` lists the stored chunk indices when `status` is
/// [`CheckStatus::PartiallyStored`] and is empty otherwise. Order is not
/// significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub status: CheckStatus,
    #[serde(default)]
    pub data: Vec<u32>,
}

impl CheckResponse {
    pub fn absent() -> Self {
        Self {
            status: CheckStatus::Absent,
            data: Vec::new(),
        }
    }

    pub fn complete() -> Self {
        Self {
            status: CheckStatus::Complete,
            data: Vec::new(),
        }
    }

    pub fn partially_stored(indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            status: CheckStatus::PartiallyStored,
            data: indices.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Payload of an upload response.
///
/// The count is informational (progress display); `check` remains the
/// authority on which chunks are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub uploaded_chunk_count: u32,
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Query parameters of a merge request.
///
/// `chunks` is the declared total chunk count. When present the server
/// refuses to merge a chunk set that is not exactly `0..chunks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeParams {
    pub file_name: String,
    pub file_md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<u32>,
}

/// Payload of a merge response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    /// Size of the merged file in bytes.
    pub size: u64,
    /// Number of chunks concatenated (0 if the file was already merged).
    pub chunk_count: u32,
}

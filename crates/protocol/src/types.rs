use serde::{Deserialize, Serialize};

/// Server-side storage status of a fingerprint, as carried on the wire.
///
/// Serialized as a bare integer: `0` absent, `1` complete, `2` partially stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CheckStatus {
    /// Nothing stored for the fingerprint; upload everything.
    Absent,
    /// A merged file already exists; nothing to upload.
    Complete,
    /// Some chunks are stored; the response lists their indices.
    PartiallyStored,
}

/// Error for an integer that does not map to a [`CheckStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown check status: {0}")]
pub struct UnknownCheckStatus(pub u8);

impl From<CheckStatus> for u8 {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Absent => 0,
            CheckStatus::Complete => 1,
            CheckStatus::PartiallyStored => 2,
        }
    }
}

impl TryFrom<u8> for CheckStatus {
    type Error = UnknownCheckStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Absent),
            1 => Ok(Self::Complete),
            2 => Ok(Self::PartiallyStored),
            other => Err(UnknownCheckStatus(other)),
        }
    }
}

/// Route for the resume negotiation endpoint.
pub const CHECK_PATH: &str = "/bigfile/check";

/// Route for the single-chunk upload endpoint.
pub const UPLOAD_PATH: &str = "/bigfile/upload";

/// Route for the merge trigger endpoint.
pub const MERGE_PATH: &str = "/bigfile/merge";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8686;

/// Default maximum request body accepted by the upload endpoint (500 MiB).
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 500 * 1024 * 1024;

// Multipart field names of an upload request.

/// Raw chunk bytes.
pub const FIELD_FILE: &str = "file";
/// Chunk index (decimal).
pub const FIELD_CHUNK: &str = "chunk";
/// Declared total chunk count (decimal).
pub const FIELD_CHUNKS: &str = "chunks";
/// Original file name.
pub const FIELD_NAME: &str = "name";
/// File fingerprint (hex).
pub const FIELD_MD5: &str = "md5";

// Result codes carried in `JsonResult::result_code`.

/// The request succeeded.
pub const RESULT_OK: i32 = 0;
/// No chunk has been stored for the fingerprint being merged.
pub const RESULT_NO_CHUNKS: i32 = 1;
/// The stored chunk set does not match the declared total.
pub const RESULT_INCOMPLETE: i32 = 2;
/// An identifying field was missing or malformed.
pub const RESULT_INVALID_INPUT: i32 = 3;
/// Generic failure (storage fault).
pub const RESULT_FAILED: i32 = -1;

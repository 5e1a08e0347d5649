use std::path::{Component, Path};

use crate::TransferError;

/// Longest accepted file name, in bytes.
const MAX_FILE_NAME_LEN: usize = 255;

/// Parses a chunk index received as text.
///
/// Rejects empty, negative, non-numeric and out-of-range values.
pub fn parse_chunk_index(raw: &str) -> Result<u32, TransferError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TransferError::InvalidIndex("empty index".into()));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransferError::InvalidIndex(format!(
            "not a non-negative integer: {raw:?}"
        )));
    }
    trimmed
        .parse::<u32>()
        .map_err(|e| TransferError::InvalidIndex(format!("{raw:?}: {e}")))
}

/// Parses a declared total chunk count received as text. Must be at least 1.
pub fn parse_chunk_total(raw: &str) -> Result<u32, TransferError> {
    let total = parse_chunk_index(raw)?;
    if total == 0 {
        return Err(TransferError::InvalidIndex(
            "total chunk count must be at least 1".into(),
        ));
    }
    Ok(total)
}

/// Validates that a file name is a single, plain path component.
///
/// Rejects:
/// - Empty names and names over 255 bytes
/// - Path separators (`/`, `\`) and NUL bytes
/// - `.` and `..`
/// - Windows drive prefixes (`C:`)
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidFileName("empty name".into()));
    }

    if name.len() > MAX_FILE_NAME_LEN {
        return Err(TransferError::InvalidFileName(format!(
            "name longer than {MAX_FILE_NAME_LEN} bytes"
        )));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidFileName(format!(
            "separators not allowed: {name:?}"
        )));
    }

    if name.len() >= 2 && name.as_bytes()[1] == b':' {
        return Err(TransferError::InvalidFileName(format!(
            "drive prefix not allowed: {name:?}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidFileName(format!(
            "not a plain file name: {name:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_accepts_digits() {
        assert_eq!(parse_chunk_index("0").unwrap(), 0);
        assert_eq!(parse_chunk_index("42").unwrap(), 42);
        assert_eq!(parse_chunk_index(" 7 ").unwrap(), 7);
    }

    #[test]
    fn index_rejects_negative() {
        assert!(matches!(
            parse_chunk_index("-1"),
            Err(TransferError::InvalidIndex(_))
        ));
    }

    #[test]
    fn index_rejects_non_numeric() {
        assert!(parse_chunk_index("").is_err());
        assert!(parse_chunk_index("abc").is_err());
        assert!(parse_chunk_index("1.5").is_err());
        assert!(parse_chunk_index("+3").is_err());
    }

    #[test]
    fn index_rejects_overflow() {
        assert!(parse_chunk_index("4294967296").is_err());
    }

    #[test]
    fn total_must_be_positive() {
        assert!(parse_chunk_total("0").is_err());
        assert_eq!(parse_chunk_total("3").unwrap(), 3);
    }

    #[test]
    fn accepts_plain_names() {
        assert!(validate_file_name("movie.mkv").is_ok());
        assert!(validate_file_name(".hidden").is_ok());
        assert!(validate_file_name("名前.txt").is_ok());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name(".").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("a/b").is_err());
        assert!(validate_file_name("a\\b").is_err());
    }

    #[test]
    fn rejects_absolute_and_prefixed() {
        assert!(validate_file_name("/tmp/x").is_err());
        assert!(validate_file_name("C:evil").is_err());
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(&"a".repeat(256)).is_err());
        assert!(validate_file_name("nul\0byte").is_err());
    }
}

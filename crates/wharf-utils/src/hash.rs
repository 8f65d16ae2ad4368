use std::path::Path;

use crate::error::{HashError, HashResult};

/// Calculates the blake3 digest of a file as a lowercase hex string.
///
/// The file is memory-mapped when large enough to benefit from it.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be read.
///
/// # Example
///
/// ```no_run
/// use wharf_utils::error::HashResult;
/// use wharf_utils::hash::calculate_checksum;
///
/// fn main() -> HashResult<()> {
///     let digest = calculate_checksum("/path/to/pkg-1.0.tar.gz")?;
///     println!("{digest}");
///     Ok(())
/// }
/// ```
pub fn calculate_checksum<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(file_path).map_err(|err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    })?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Returns true if `value` looks like a blake3 hex digest.
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_calculate_checksum() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"wharf").unwrap();
        let digest = calculate_checksum(file.path()).unwrap();
        assert_eq!(digest, blake3::hash(b"wharf").to_hex().to_string());
        assert!(is_hex_digest(&digest));
    }

    #[test]
    fn test_calculate_checksum_missing_file() {
        let result = calculate_checksum("/definitely/not/here");
        assert!(matches!(result, Err(HashError::ReadFailed { .. })));
    }

    #[test]
    fn test_is_hex_digest() {
        assert!(is_hex_digest(&"a".repeat(64)));
        assert!(!is_hex_digest(&"A".repeat(64)));
        assert!(!is_hex_digest("abc"));
        assert!(!is_hex_digest(&"g".repeat(64)));
    }
}

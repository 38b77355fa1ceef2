//! Checksum utilities for snapshot integrity

use crate::error::{EdpError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;

/// Compute the hex-encoded SHA-256 digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the hex-encoded SHA-256 digest of any readable source.
pub fn sha256_hex_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify that `data` hashes to `expected`.
pub fn verify_sha256(data: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(data);
    if actual == expected {
        Ok(())
    } else {
        Err(EdpError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sha256_hex() {
        let checksum = sha256_hex(b"hello world");
        assert_eq!(checksum, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[test]
    fn test_sha256_hex_reader_matches_slice() {
        let data = b"hello world";
        let mut cursor = Cursor::new(data);
        let from_reader = sha256_hex_reader(&mut cursor).unwrap();
        assert_eq!(from_reader, sha256_hex(data));
    }

    #[test]
    fn test_verify_sha256_mismatch() {
        let err = verify_sha256(b"hello world", "deadbeef").unwrap_err();
        match err {
            EdpError::ChecksumMismatch { expected, actual } => {
                assert_eq!(expected, "deadbeef");
                assert_eq!(actual, sha256_hex(b"hello world"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

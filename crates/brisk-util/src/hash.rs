/// Compute the BLAKE3 hash of a byte slice, returning the hex-encoded digest.
#[must_use]
pub fn blake3_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Compute a truncated BLAKE3 hex digest suitable for embedding in file names.
///
/// `len` is clamped to the full digest length (64 hex characters).
#[must_use]
pub fn short_hash(data: &[u8], len: usize) -> String {
    let mut hex = blake3_bytes(data);
    hex.truncate(len.min(hex.len()));
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_bytes() {
        let hash = blake3_bytes(b"hello world");
        assert_eq!(
            hash,
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_short_hash_truncates() {
        assert_eq!(short_hash(b"hello world", 6), "d74981");
        assert_eq!(short_hash(b"hello world", 500).len(), 64);
    }

    #[test]
    fn test_short_hash_differs_on_content() {
        assert_ne!(short_hash(b"a", 8), short_hash(b"b", 8));
    }
}

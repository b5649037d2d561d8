//! Content digest and basic integrity predicates

use sha2::{Digest, Sha256};

use crate::{Check, IntegrityReport};

/// Hex length of a SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

pub const CHECK_DIGEST_COMPUTED: &str = "Digest computed";
pub const CHECK_HASH_VALID: &str = "Hash valid";
pub const CHECK_SIZE_VALID: &str = "Size valid";
pub const CHECK_NO_CORRUPTION: &str = "No corruption";

pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compute digest and size and record each predicate. Never fails.
pub fn check(bytes: &[u8]) -> IntegrityReport {
    let digest_value = digest_hex(bytes);
    let byte_size = bytes.len() as u64;

    let checks = vec![
        Check::new(CHECK_DIGEST_COMPUTED, !digest_value.is_empty()),
        Check::new(CHECK_HASH_VALID, digest_value.len() == DIGEST_HEX_LEN),
        Check::new(CHECK_SIZE_VALID, byte_size > 0),
        Check::new(CHECK_NO_CORRUPTION, !looks_corrupted(bytes)),
    ];
    let valid_digest = checks.iter().all(|c| c.passed);

    IntegrityReport {
        valid_digest,
        digest_value,
        byte_size,
        checks,
    }
}

// Text datasets never carry NUL bytes or invalid UTF-8; either one means a
// binary blob or a cut-off multi-byte sequence.
fn looks_corrupted(bytes: &[u8]) -> bool {
    bytes.contains(&0) || std::str::from_utf8(bytes).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let r = check(b"abc");
        assert_eq!(r.digest_value, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(r.byte_size, 3);
        assert!(r.valid_digest);
        assert_eq!(r.checks.len(), 4);
    }

    #[test]
    fn test_empty_content_fails_size() {
        let r = check(b"");
        assert!(!r.valid_digest);
        assert_eq!(r.byte_size, 0);
        let size = r.checks.iter().find(|c| c.name == CHECK_SIZE_VALID).unwrap();
        assert!(!size.passed);
        // digest of empty input is still well formed
        assert_eq!(r.digest_value.len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_truncated_utf8_is_corruption() {
        // "é" is 0xC3 0xA9; cut after the first byte
        let r = check(b"id,name\n1,caf\xC3");
        assert!(!r.valid_digest);
        assert!(!r.checks.iter().find(|c| c.name == CHECK_NO_CORRUPTION).unwrap().passed);
    }

    #[test]
    fn test_nul_byte_is_corruption() {
        assert!(!check(b"id\0name").valid_digest);
    }
}

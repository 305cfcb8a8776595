//! Sealpost Common
//!
//! Shared utilities for the Sealpost PKCS#7 stack.
//!
//! This crate provides:
//! - Component-based structured logging with a caller context label
//! - DNS-safe compact ID generation for certificate fingerprints

pub mod logging;

pub use logging::{Component, Logger};

/// Utility module for compact ID encoding
pub mod compact_ids {
    use data_encoding::BASE32HEX_NOPAD;
    use sha2::{Digest, Sha256};

    /// Generate a DNS-safe compact ID from arbitrary bytes (typically DER) using SHA-256.
    /// - Truncate: first 16 bytes of SHA-256 hash
    /// - Encode: Base32hex (no padding), lowercase (26 chars)
    pub fn compact_id(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash_result = hasher.finalize();

        let compact_hash = &hash_result[..16];
        BASE32HEX_NOPAD.encode(compact_hash).to_lowercase()
    }

}

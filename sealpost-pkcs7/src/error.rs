use thiserror::Error;

/// Error types for the sealpost-pkcs7 crate
///
/// Signature verification failure is deliberately absent from the regular
/// flow: `verify` reports it as [`crate::Verification::Unverified`]. Only the
/// strict API surfaces it as [`Pkcs7Error::VerificationFailed`].
#[derive(Error, Debug)]
pub enum Pkcs7Error {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid key pair: {0}")]
    InvalidKeyPair(String),

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Trust store error: {0}")]
    TrustStoreError(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<openssl::error::ErrorStack> for Pkcs7Error {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Pkcs7Error::CertificateError(err.to_string())
    }
}

/// Result type for sealpost-pkcs7 operations
pub type Result<T> = std::result::Result<T, Pkcs7Error>;

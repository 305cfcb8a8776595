//! Sealpost PKCS#7 – public API facade
//!
//! Signs payloads into PKCS#7 Signed-Data, envelopes them for a single
//! recipient, reverses the process, and issues certificates from PKCS#10
//! requests. OpenSSL provides the primitives; this crate owns the sequencing,
//! data shapes and error semantics.
//!
//! Verification reports a bad signature as [`Verification::Unverified`],
//! not as an error. Match on the outcome, or use the `*_strict` variants.

pub mod config;
pub mod decryptor;
pub mod envelope;
pub mod error;
pub mod issuer;
pub mod material;
pub mod pkcs7;
pub mod signer;
pub mod trust;
pub mod verifier;
pub mod workflow;

pub use error::{Pkcs7Error, Result};

pub use config::{
    CertificateDigest, ContentCipher, Pkcs7Config, SignFlags, VerifyMode, DEFAULT_VALIDITY_DAYS,
};

pub use material::{Certificate, CertificateRequest, MaterialLoader, PemLoader, PrivateKey};

pub use pkcs7::{EnvelopedData, SignedData};

pub use trust::{TrustAnchors, TrustStore};

pub use decryptor::Decryptor;
pub use envelope::Enveloper;
pub use issuer::CertificateIssuer;
pub use signer::Signer;
pub use verifier::{Verification, Verifier};

pub use workflow::Pkcs7Workflow;

pub use openssl::pkcs7::Pkcs7Flags;

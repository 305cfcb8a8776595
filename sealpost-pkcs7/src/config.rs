//! Workflow configuration
//!
//! Every tunable of the sign/envelope/issue pipeline lives in [`Pkcs7Config`].
//! There is no process-wide default: callers pass a config (usually
//! `Pkcs7Config::default()`) to the workflow they construct.

use std::fmt;
use std::str::FromStr;

use openssl::hash::MessageDigest;
use openssl::pkcs7::Pkcs7Flags;
use openssl::symm::Cipher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Pkcs7Error, Result};

/// Default lifetime of issued certificates, in days (10 years)
pub const DEFAULT_VALIDITY_DAYS: i64 = 3650;

/// Symmetric cipher used for the Enveloped-Data content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentCipher {
    #[serde(rename = "aes-128-cbc")]
    Aes128Cbc,
    #[serde(rename = "aes-192-cbc")]
    Aes192Cbc,
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,
    #[serde(rename = "des-ede3-cbc")]
    DesEde3Cbc,
}

impl ContentCipher {
    pub fn name(&self) -> &'static str {
        match self {
            ContentCipher::Aes128Cbc => "aes-128-cbc",
            ContentCipher::Aes192Cbc => "aes-192-cbc",
            ContentCipher::Aes256Cbc => "aes-256-cbc",
            ContentCipher::DesEde3Cbc => "des-ede3-cbc",
        }
    }

    /// Provider cipher handle
    pub fn cipher(&self) -> Cipher {
        match self {
            ContentCipher::Aes128Cbc => Cipher::aes_128_cbc(),
            ContentCipher::Aes192Cbc => Cipher::aes_192_cbc(),
            ContentCipher::Aes256Cbc => Cipher::aes_256_cbc(),
            ContentCipher::DesEde3Cbc => Cipher::des_ede3_cbc(),
        }
    }
}

impl fmt::Display for ContentCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentCipher {
    type Err = Pkcs7Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-128-cbc" | "aes128" => Ok(ContentCipher::Aes128Cbc),
            "aes-192-cbc" | "aes192" => Ok(ContentCipher::Aes192Cbc),
            "aes-256-cbc" | "aes256" => Ok(ContentCipher::Aes256Cbc),
            "des-ede3-cbc" | "des3" => Ok(ContentCipher::DesEde3Cbc),
            other => Err(Pkcs7Error::ConfigError(format!(
                "Unsupported content cipher: {other}"
            ))),
        }
    }
}

/// Bitmask handed to the provider when signing.
///
/// The bits are passed through untouched except for `DETACHED` and
/// `NOCERTS`, which are always cleared: Signed-Data produced here embeds its
/// payload and exactly the signer certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignFlags(Pkcs7Flags);

impl SignFlags {
    pub fn new(flags: Pkcs7Flags) -> Self {
        Self(flags)
    }

    pub fn from_bits(bits: i32) -> Self {
        Self(Pkcs7Flags::from_bits_truncate(bits as _))
    }

    pub fn bits(&self) -> i32 {
        self.0.bits() as i32
    }

    /// Flags as they reach the provider
    pub fn effective(&self) -> Pkcs7Flags {
        let mut flags = self.0;
        flags.remove(Pkcs7Flags::DETACHED | Pkcs7Flags::NOCERTS);
        flags
    }

    pub fn requested(&self) -> Pkcs7Flags {
        self.0
    }
}

impl Default for SignFlags {
    /// Binary mode: the payload is signed byte-for-byte, no MIME canonicalisation
    fn default() -> Self {
        Self(Pkcs7Flags::BINARY)
    }
}

impl From<Pkcs7Flags> for SignFlags {
    fn from(flags: Pkcs7Flags) -> Self {
        Self(flags)
    }
}

impl Serialize for SignFlags {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignFlags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i32::deserialize(deserializer)?;
        Ok(Self::from_bits(bits))
    }
}

/// How a Signed-Data signature is tied to a certificate during verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyMode {
    /// "No intern, no chain": the signer is looked up only among the
    /// caller-supplied certificates and embedded certificates are never used
    /// as intermediates. The supplied certificate must validate against the
    /// trust store on its own.
    #[default]
    SuppliedCertificate,
    /// The signer is still taken from the supplied certificates, but embedded
    /// certificates may complete the chain and the S/MIME signing purpose is
    /// enforced.
    TrustStoreChain,
}

impl VerifyMode {
    pub fn flags(&self) -> Pkcs7Flags {
        match self {
            VerifyMode::SuppliedCertificate => Pkcs7Flags::NOINTERN | Pkcs7Flags::NOCHAIN,
            VerifyMode::TrustStoreChain => Pkcs7Flags::NOINTERN,
        }
    }
}

/// Digest used when signing issued certificates.
///
/// SHA-1 was the historical default and remains selectable as
/// `LegacySha1`; the default is now SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateDigest {
    #[default]
    Sha256,
    Sha384,
    Sha512,
    LegacySha1,
}

impl CertificateDigest {
    pub fn message_digest(&self) -> MessageDigest {
        match self {
            CertificateDigest::Sha256 => MessageDigest::sha256(),
            CertificateDigest::Sha384 => MessageDigest::sha384(),
            CertificateDigest::Sha512 => MessageDigest::sha512(),
            CertificateDigest::LegacySha1 => MessageDigest::sha1(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, CertificateDigest::LegacySha1)
    }
}

/// Configuration for [`crate::Pkcs7Workflow`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pkcs7Config {
    /// Content cipher for envelopes
    pub cipher: ContentCipher,
    /// Signing flags passed to the provider
    pub sign_flags: SignFlags,
    /// Verification mode
    pub verify_mode: VerifyMode,
    /// Digest for issued certificate signatures
    pub certificate_digest: CertificateDigest,
    /// Lifetime of issued certificates when no explicit end is given
    pub certificate_validity_days: i64,
}

impl Default for Pkcs7Config {
    fn default() -> Self {
        Self {
            cipher: ContentCipher::default(),
            sign_flags: SignFlags::default(),
            verify_mode: VerifyMode::default(),
            certificate_digest: CertificateDigest::default(),
            certificate_validity_days: DEFAULT_VALIDITY_DAYS,
        }
    }
}

impl Pkcs7Config {
    pub fn with_cipher(mut self, cipher: ContentCipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_sign_flags(mut self, flags: impl Into<SignFlags>) -> Self {
        self.sign_flags = flags.into();
        self
    }

    pub fn with_verify_mode(mut self, mode: VerifyMode) -> Self {
        self.verify_mode = mode;
        self
    }

    pub fn with_certificate_digest(mut self, digest: CertificateDigest) -> Self {
        self.certificate_digest = digest;
        self
    }

    pub fn with_certificate_validity_days(mut self, days: i64) -> Self {
        self.certificate_validity_days = days;
        self
    }

    /// Validity window for issued certificates
    pub fn certificate_validity(&self) -> Result<chrono::Duration> {
        if self.certificate_validity_days <= 0 {
            return Err(Pkcs7Error::ConfigError(format!(
                "Certificate validity must be positive, got {} days",
                self.certificate_validity_days
            )));
        }
        chrono::Duration::try_days(self.certificate_validity_days).ok_or_else(|| {
            Pkcs7Error::ConfigError(format!(
                "Certificate validity out of range: {} days",
                self.certificate_validity_days
            ))
        })
    }
}

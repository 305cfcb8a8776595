//! Key and certificate material
//!
//! Typed handles for private keys, X.509 certificates and PKCS#10 requests,
//! plus the [`MaterialLoader`] capability used to turn encoded bytes into
//! those handles. The PKCS#7 components only ever see the handles.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509Ref, X509Req, X509ReqBuilder, X509};
use sealpost_common::compact_ids::compact_id;
use sealpost_common::logging::{Component, Logger};
use serde::{Deserialize, Serialize};
use x509_parser::prelude::{FromDer, X509Certificate, X509CertificationRequest};

use crate::config::CertificateDigest;
use crate::error::{Pkcs7Error, Result};

/// Asymmetric private key handle. Never serialized.
#[derive(Clone)]
pub struct PrivateKey {
    pkey: PKey<Private>,
}

impl PrivateKey {
    /// Generate a new RSA key. RSA keys can both sign and receive envelopes.
    pub fn generate_rsa(bits: u32) -> Result<Self> {
        let rsa = Rsa::generate(bits)?;
        Ok(Self {
            pkey: PKey::from_rsa(rsa)?,
        })
    }

    /// Generate a new ECDSA P-256 key. EC keys sign but cannot receive envelopes.
    pub fn generate_ec_p256() -> Result<Self> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        let ec_key = EcKey::generate(&group)?;
        Ok(Self {
            pkey: PKey::from_ec_key(ec_key)?,
        })
    }

    pub fn from_pkey(pkey: PKey<Private>) -> Self {
        Self { pkey }
    }

    pub fn pkey(&self) -> &PKeyRef<Private> {
        &self.pkey
    }

    pub fn algorithm(&self) -> &'static str {
        algorithm_name(self.pkey.id())
    }

    /// SubjectPublicKeyInfo DER of the public half
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        Ok(self.pkey.public_key_to_der()?)
    }

    /// Whether this key is the private counterpart of `certificate`'s public key
    pub fn matches(&self, certificate: &Certificate) -> Result<bool> {
        let public_key = certificate.public_key()?;
        Ok(self.pkey.public_eq(&public_key))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PrivateKey({}, {} bits)",
            self.algorithm(),
            self.pkey.bits()
        )
    }
}

/// Standard X.509 certificate wrapper
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
    /// DER-encoded certificate bytes
    der_bytes: Vec<u8>,
    subject: String,
    issuer: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl Certificate {
    /// Create from DER-encoded bytes
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let x509 = X509::from_der(der_bytes)
            .map_err(|e| Pkcs7Error::InvalidFormat(format!("Failed to parse certificate: {e}")))?;
        Self::from_x509(x509)
    }

    /// Create from a PEM-armoured certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let x509 = X509::from_pem(pem)
            .map_err(|e| Pkcs7Error::InvalidFormat(format!("Failed to parse certificate: {e}")))?;
        Self::from_x509(x509)
    }

    /// Wrap a provider certificate, caching its metadata
    pub fn from_x509(x509: X509) -> Result<Self> {
        let der_bytes = x509.to_der()?;
        let (_, parsed) = X509Certificate::from_der(&der_bytes).map_err(|e| {
            Pkcs7Error::InvalidFormat(format!("Failed to parse certificate: {e}"))
        })?;

        let subject = parsed.subject().to_string();
        let issuer = parsed.issuer().to_string();
        let validity = parsed.validity();
        let not_before = utc_from_timestamp(validity.not_before.timestamp())?;
        let not_after = utc_from_timestamp(validity.not_after.timestamp())?;

        Ok(Self {
            x509,
            der_bytes,
            subject,
            issuer,
            not_before,
            not_after,
        })
    }

    /// Create a self-signed CA certificate for `key`.
    ///
    /// The certificate may sign Signed-Data, issue certificates and, for RSA
    /// keys, receive envelopes.
    pub fn self_signed(
        key: &PrivateKey,
        subject: &str,
        validity: chrono::Duration,
        digest: CertificateDigest,
    ) -> Result<Self> {
        let name = build_name(subject)?;
        let now = Utc::now();

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let serial = time_derived_serial()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(key.pkey())?;
        let not_before = asn1_time(now)?;
        builder.set_not_before(&not_before)?;
        let not_after = asn1_time(now + validity)?;
        builder.set_not_after(&not_after)?;
        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .key_cert_sign()
                .crl_sign()
                .build()?,
        )?;
        builder.sign(key.pkey(), digest.message_digest())?;

        Self::from_x509(builder.build())
    }

    pub fn x509(&self) -> &X509Ref {
        &self.x509
    }

    /// Get DER-encoded bytes
    pub fn der_bytes(&self) -> &[u8] {
        &self.der_bytes
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.x509.to_pem()?)
    }

    /// Get certificate subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get certificate issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Serial number as upper-case hex
    pub fn serial_hex(&self) -> Result<String> {
        let serial = self.x509.serial_number().to_bn()?;
        Ok(serial.to_hex_str()?.to_string())
    }

    pub fn public_key(&self) -> Result<PKey<Public>> {
        Ok(self.x509.public_key()?)
    }

    /// SubjectPublicKeyInfo DER of the certified key
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        Ok(self.public_key()?.public_key_to_der()?)
    }

    /// DNS-safe fingerprint of the certificate, used in logs
    pub fn fingerprint(&self) -> String {
        compact_id(&self.der_bytes)
    }

    /// Whether `at` falls inside `[not_before, not_after]`
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der_bytes == other.der_bytes
    }
}

impl Eq for Certificate {}

impl Serialize for Certificate {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.der_bytes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Certificate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let der_bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        Self::from_der(&der_bytes).map_err(|e| {
            serde::de::Error::custom(format!("Failed to deserialize certificate: {e}"))
        })
    }
}

/// PKCS#10 certificate signing request
pub struct CertificateRequest {
    req: X509Req,
    der_bytes: Vec<u8>,
    subject: String,
}

impl CertificateRequest {
    /// Build a request for `subject`, self-signed with `key`
    pub fn build(key: &PrivateKey, subject: &str, digest: CertificateDigest) -> Result<Self> {
        let name = build_name(subject)?;

        let mut builder = X509ReqBuilder::new()?;
        builder.set_version(0)?;
        builder.set_subject_name(&name)?;
        builder.set_pubkey(key.pkey())?;
        builder.sign(key.pkey(), digest.message_digest())?;

        Self::from_req(builder.build())
    }

    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let req = X509Req::from_der(der_bytes)
            .map_err(|e| Pkcs7Error::InvalidFormat(format!("Failed to parse CSR: {e}")))?;
        Self::from_req(req)
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let req = X509Req::from_pem(pem)
            .map_err(|e| Pkcs7Error::InvalidFormat(format!("Failed to parse CSR: {e}")))?;
        Self::from_req(req)
    }

    pub fn from_req(req: X509Req) -> Result<Self> {
        let der_bytes = req.to_der()?;
        let (_, parsed) = X509CertificationRequest::from_der(&der_bytes)
            .map_err(|e| Pkcs7Error::InvalidFormat(format!("Failed to parse CSR: {e}")))?;
        let subject = parsed.certification_request_info.subject.to_string();

        Ok(Self {
            req,
            der_bytes,
            subject,
        })
    }

    pub fn req(&self) -> &X509Req {
        &self.req
    }

    pub fn der_bytes(&self) -> &[u8] {
        &self.der_bytes
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.req.to_pem()?)
    }

    /// Requested subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.req
            .public_key()
            .map_err(|e| Pkcs7Error::InvalidFormat(format!("CSR carries no usable public key: {e}")))
    }

    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        Ok(self.public_key()?.public_key_to_der()?)
    }

    /// Proof of possession: the request signature checks out against the
    /// public key it carries
    pub fn verify_self_signature(&self) -> Result<bool> {
        let public_key = self.public_key()?;
        // A malformed signature is reported as an error by the provider; it
        // still means the request does not verify.
        Ok(self.req.verify(&public_key).unwrap_or(false))
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("subject", &self.subject)
            .field("len", &self.der_bytes.len())
            .finish()
    }
}

/// Capability interface turning encoded material into typed handles
pub trait MaterialLoader: Send + Sync + fmt::Debug {
    fn load_private_key(&self, input: &[u8]) -> Result<PrivateKey>;
    fn load_certificate(&self, input: &[u8]) -> Result<Certificate>;
    fn load_csr(&self, input: &[u8]) -> Result<CertificateRequest>;
}

/// Loader accepting PEM armour or raw DER
#[derive(Debug, Clone)]
pub struct PemLoader {
    logger: Arc<Logger>,
}

impl Default for PemLoader {
    fn default() -> Self {
        Self::new(Arc::new(Logger::new_root(Component::Loader, "loader")))
    }
}

impl PemLoader {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl MaterialLoader for PemLoader {
    fn load_private_key(&self, input: &[u8]) -> Result<PrivateKey> {
        let pkey = if is_pem(input) {
            PKey::private_key_from_pem(input)
        } else {
            PKey::private_key_from_der(input)
        }
        .map_err(|e| Pkcs7Error::InvalidFormat(format!("Failed to parse private key: {e}")))?;

        let key = PrivateKey::from_pkey(pkey);
        self.logger.debug(format!("Loaded {key:?}"));
        Ok(key)
    }

    fn load_certificate(&self, input: &[u8]) -> Result<Certificate> {
        let certificate = if is_pem(input) {
            Certificate::from_pem(input)?
        } else {
            Certificate::from_der(input)?
        };
        self.logger.debug(format!(
            "Loaded certificate {} ({})",
            certificate.subject(),
            certificate.fingerprint()
        ));
        Ok(certificate)
    }

    fn load_csr(&self, input: &[u8]) -> Result<CertificateRequest> {
        let csr = if is_pem(input) {
            CertificateRequest::from_pem(input)?
        } else {
            CertificateRequest::from_der(input)?
        };
        self.logger
            .debug(format!("Loaded certificate request for {}", csr.subject()));
        Ok(csr)
    }
}

pub(crate) fn is_pem(input: &[u8]) -> bool {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    input[start..].starts_with(b"-----BEGIN")
}

fn algorithm_name(id: Id) -> &'static str {
    if id == Id::RSA {
        "RSA"
    } else if id == Id::EC {
        "EC"
    } else if id == Id::ED25519 {
        "Ed25519"
    } else if id == Id::DSA {
        "DSA"
    } else {
        "unknown"
    }
}

/// Build an X.509 name from `CN=..,O=..,C=..` notation. Unknown components are skipped.
pub(crate) fn build_name(subject: &str) -> Result<X509Name> {
    let mut builder = X509NameBuilder::new()?;
    let mut entries = 0;

    for component in subject.split(',') {
        let component = component.trim();
        if let Some((key, value)) = component.split_once('=') {
            let nid = match key.trim() {
                "CN" => Nid::COMMONNAME,
                "O" => Nid::ORGANIZATIONNAME,
                "OU" => Nid::ORGANIZATIONALUNITNAME,
                "C" => Nid::COUNTRYNAME,
                "ST" => Nid::STATEORPROVINCENAME,
                "L" => Nid::LOCALITYNAME,
                _ => continue,
            };
            builder.append_entry_by_nid(nid, value.trim())?;
            entries += 1;
        }
    }

    if entries == 0 {
        return Err(Pkcs7Error::InvalidFormat(format!(
            "Subject has no recognised components: {subject}"
        )));
    }
    Ok(builder.build())
}

/// Serial number derived from the current time in nanoseconds
pub(crate) fn time_derived_serial() -> Result<Asn1Integer> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Pkcs7Error::CertificateError(format!("System time error: {e}")))?
        .as_nanos();
    let bn = BigNum::from_slice(&nanos.to_be_bytes())?;
    Ok(bn.to_asn1_integer()?)
}

pub(crate) fn asn1_time(at: DateTime<Utc>) -> Result<Asn1Time> {
    Ok(Asn1Time::from_unix(at.timestamp() as _)?)
}

fn utc_from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        Pkcs7Error::InvalidFormat(format!("Certificate time out of range: {secs}"))
    })
}

//! Certificate issuance from PKCS#10 requests
//!
//! Issuance is all-or-nothing: the request's self-signature is checked
//! first and nothing is built when it fails.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use openssl::x509::extension::{BasicConstraints, ExtendedKeyUsage, KeyUsage};
use openssl::x509::X509Builder;
use sealpost_common::logging::{Component, Logger};

use crate::config::CertificateDigest;
use crate::error::{Pkcs7Error, Result};
use crate::material::{
    asn1_time, time_derived_serial, Certificate, CertificateRequest, MaterialLoader, PemLoader,
    PrivateKey,
};

/// Issues leaf certificates signed by an issuer key pair
#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    digest: CertificateDigest,
    validity: chrono::Duration,
    loader: Arc<dyn MaterialLoader>,
    logger: Arc<Logger>,
}

impl CertificateIssuer {
    pub fn new(digest: CertificateDigest, validity: chrono::Duration, logger: Arc<Logger>) -> Self {
        if digest.is_legacy() {
            logger.warn("Issuing certificates with a legacy SHA-1 signature digest");
        }
        let loader = Arc::new(PemLoader::new(Arc::new(
            logger.with_component(Component::Loader),
        )));
        Self {
            digest,
            validity,
            loader,
            logger,
        }
    }

    /// Replace the loader used to decode encoded requests
    pub fn with_loader(mut self, loader: Arc<dyn MaterialLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn loader(&self) -> &Arc<dyn MaterialLoader> {
        &self.loader
    }

    pub fn digest(&self) -> CertificateDigest {
        self.digest
    }

    pub fn default_validity(&self) -> chrono::Duration {
        self.validity
    }

    /// Issue a certificate valid from now for the configured validity window
    pub fn issue(
        &self,
        csr: &CertificateRequest,
        issuer_key: &PrivateKey,
        issuer_cert: &Certificate,
    ) -> Result<Certificate> {
        let now = Utc::now();
        self.issue_window(csr, issuer_key, issuer_cert, now, now + self.validity)
    }

    /// Issue a certificate valid from now until `valid_until`, normalised to UTC.
    /// ASN.1 validity has one-second precision; sub-second parts are dropped.
    pub fn issue_until<Tz: TimeZone>(
        &self,
        csr: &CertificateRequest,
        issuer_key: &PrivateKey,
        issuer_cert: &Certificate,
        valid_until: DateTime<Tz>,
    ) -> Result<Certificate> {
        let valid_until = valid_until.with_timezone(&Utc);
        self.issue_window(csr, issuer_key, issuer_cert, Utc::now(), valid_until)
    }

    /// Decode a request through the configured loader, then [`CertificateIssuer::issue`]
    pub fn issue_encoded(
        &self,
        csr: &[u8],
        issuer_key: &PrivateKey,
        issuer_cert: &Certificate,
    ) -> Result<Certificate> {
        let csr = self.loader.load_csr(csr)?;
        self.issue(&csr, issuer_key, issuer_cert)
    }

    fn issue_window(
        &self,
        csr: &CertificateRequest,
        issuer_key: &PrivateKey,
        issuer_cert: &Certificate,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Result<Certificate> {
        if !csr.verify_self_signature()? {
            self.logger
                .warn(format!("Rejected request for {}", csr.subject()));
            return Err(Pkcs7Error::InvalidRequest(
                "CSR can not be verified".to_string(),
            ));
        }
        // Compared at ASN.1 precision: both ends are truncated to whole seconds
        if not_after.timestamp() <= not_before.timestamp() {
            return Err(Pkcs7Error::InvalidRequest(format!(
                "Validity end {not_after} is not after issuance time {not_before}"
            )));
        }
        if !issuer_key.matches(issuer_cert)? {
            return Err(Pkcs7Error::InvalidKeyPair(format!(
                "Issuer key does not match certificate {}",
                issuer_cert.subject()
            )));
        }

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let serial = time_derived_serial()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(csr.req().subject_name())?;
        builder.set_issuer_name(issuer_cert.x509().subject_name())?;
        let pubkey = csr.public_key()?;
        builder.set_pubkey(&pubkey)?;
        let not_before = asn1_time(not_before)?;
        builder.set_not_before(&not_before)?;
        let not_after = asn1_time(not_after)?;
        builder.set_not_after(&not_after)?;

        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        builder.append_extension(
            ExtendedKeyUsage::new()
                .client_auth()
                .email_protection()
                .build()?,
        )?;

        builder
            .sign(issuer_key.pkey(), self.digest.message_digest())
            .map_err(|e| Pkcs7Error::CertificateError(format!("Failed to sign certificate: {e}")))?;

        // Round-trip through PEM so the handle matches what a loader would produce
        let pem = builder.build().to_pem()?;
        let certificate = Certificate::from_pem(&pem)?;

        self.logger.info_args(format_args!(
            "Issued certificate {} for {} until {}",
            certificate.fingerprint(),
            certificate.subject(),
            certificate.not_after()
        ));
        Ok(certificate)
    }
}

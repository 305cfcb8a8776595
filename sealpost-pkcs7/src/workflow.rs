//! Sign → envelope and unwrap → verify pipelines, plus certificate issuance
//!
//! [`Pkcs7Workflow`] wires the components together from one
//! [`Pkcs7Config`]. It holds no mutable state; a single instance can be
//! shared across threads.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use sealpost_common::logging::{Component, Logger};

use crate::config::{Pkcs7Config, SignFlags};
use crate::decryptor::Decryptor;
use crate::envelope::Enveloper;
use crate::error::Result;
use crate::issuer::CertificateIssuer;
use crate::material::{Certificate, CertificateRequest, MaterialLoader, PemLoader, PrivateKey};
use crate::pkcs7::{EnvelopedData, SignedData};
use crate::signer::Signer;
use crate::trust::TrustStore;
use crate::verifier::{Verification, Verifier};

#[derive(Debug, Clone)]
pub struct Pkcs7Workflow {
    config: Pkcs7Config,
    signer: Signer,
    enveloper: Enveloper,
    verifier: Verifier,
    decryptor: Decryptor,
    issuer: CertificateIssuer,
    logger: Arc<Logger>,
}

impl Pkcs7Workflow {
    /// Build the pipeline. Fails only on an invalid configuration.
    pub fn new(config: Pkcs7Config, logger: Arc<Logger>) -> Result<Self> {
        let validity = config.certificate_validity()?;
        let child = |component: Component| Arc::new(logger.with_component(component));

        let signer = Signer::new(config.sign_flags, child(Component::Signer));
        let enveloper = Enveloper::new(config.cipher, child(Component::Enveloper));
        let verifier = Verifier::new(config.verify_mode, child(Component::Verifier));
        let decryptor = Decryptor::new(verifier.clone(), child(Component::Decryptor));
        let issuer = CertificateIssuer::new(
            config.certificate_digest,
            validity,
            child(Component::Issuer),
        )
        .with_loader(Arc::new(PemLoader::new(child(Component::Loader))));

        logger.debug(format!(
            "PKCS#7 workflow ready (cipher={}, verify_mode={:?}, digest={:?})",
            config.cipher, config.verify_mode, config.certificate_digest
        ));

        Ok(Self {
            config,
            signer,
            enveloper,
            verifier,
            decryptor,
            issuer,
            logger,
        })
    }

    /// Workflow with default configuration and a root logger labelled `context`
    pub fn with_defaults(context: &str) -> Result<Self> {
        let logger = Arc::new(Logger::new_root(Component::Workflow, context));
        Self::new(Pkcs7Config::default(), logger)
    }

    /// Decode encoded requests with `loader` instead of the PEM/DER default
    pub fn with_loader(mut self, loader: Arc<dyn MaterialLoader>) -> Self {
        self.issuer = self.issuer.with_loader(loader);
        self
    }

    pub fn config(&self) -> &Pkcs7Config {
        &self.config
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn enveloper(&self) -> &Enveloper {
        &self.enveloper
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn decryptor(&self) -> &Decryptor {
        &self.decryptor
    }

    pub fn issuer(&self) -> &CertificateIssuer {
        &self.issuer
    }

    pub fn sign(&self, payload: &[u8], key: &PrivateKey, cert: &Certificate) -> Result<SignedData> {
        self.signer.sign(payload, key, cert)
    }

    pub fn sign_with_flags(
        &self,
        payload: &[u8],
        key: &PrivateKey,
        cert: &Certificate,
        flags: impl Into<SignFlags>,
    ) -> Result<SignedData> {
        self.signer.sign_with_flags(payload, key, cert, flags.into())
    }

    /// Sign `payload`, then envelope the Signed-Data for `recipient_cert`
    pub fn sign_and_encrypt(
        &self,
        payload: &[u8],
        key: &PrivateKey,
        cert: &Certificate,
        recipient_cert: &Certificate,
    ) -> Result<EnvelopedData> {
        self.logger
            .with_operation("sign_and_encrypt")
            .debug_args(format_args!(
                "{} -> {}",
                cert.fingerprint(),
                recipient_cert.fingerprint()
            ));
        let signed = self.signer.sign(payload, key, cert)?;
        self.enveloper.envelope_signed(&signed, recipient_cert)
    }

    pub fn sign_and_encrypt_with_flags(
        &self,
        payload: &[u8],
        key: &PrivateKey,
        cert: &Certificate,
        recipient_cert: &Certificate,
        flags: impl Into<SignFlags>,
    ) -> Result<EnvelopedData> {
        let signed = self.signer.sign_with_flags(payload, key, cert, flags.into())?;
        self.enveloper.envelope_signed(&signed, recipient_cert)
    }

    /// See [`Verifier::verify`]: a bad signature is `Ok(Verification::Unverified(..))`
    pub fn verify(
        &self,
        signed: SignedData,
        cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        self.verifier.verify(signed, cert, trust_store)
    }

    pub fn verify_der(
        &self,
        signed: &[u8],
        cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        self.verifier.verify_der(signed, cert, trust_store)
    }

    /// Verification where a bad signature is an error
    pub fn verify_strict(
        &self,
        signed: SignedData,
        cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Vec<u8>> {
        self.verifier.verify_strict(signed, cert, trust_store)
    }

    /// See [`Decryptor::decrypt_and_verify`]
    pub fn decrypt_and_verify(
        &self,
        enveloped: &EnvelopedData,
        key: &PrivateKey,
        cert: &Certificate,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        self.logger
            .with_operation("decrypt_and_verify")
            .debug_args(format_args!(
                "{} bytes for {} from {}",
                enveloped.len(),
                cert.fingerprint(),
                signer_cert.fingerprint()
            ));
        self.decryptor
            .decrypt_and_verify(enveloped, key, cert, signer_cert, trust_store)
    }

    pub fn decrypt_and_verify_der(
        &self,
        enveloped: &[u8],
        key: &PrivateKey,
        cert: &Certificate,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        self.decryptor
            .decrypt_and_verify_der(enveloped, key, cert, signer_cert, trust_store)
    }

    /// Decrypt and verify, failing on a bad signature
    pub fn decrypt_and_verify_strict(
        &self,
        enveloped: &EnvelopedData,
        key: &PrivateKey,
        cert: &Certificate,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Vec<u8>> {
        self.decrypt_and_verify(enveloped, key, cert, signer_cert, trust_store)?
            .into_result()
    }

    /// Issue a certificate for `csr` using the configured validity window
    pub fn sign_certificate(
        &self,
        csr: &CertificateRequest,
        key: &PrivateKey,
        issuer_cert: &Certificate,
    ) -> Result<Certificate> {
        self.issuer.issue(csr, key, issuer_cert)
    }

    pub fn sign_certificate_until<Tz: TimeZone>(
        &self,
        csr: &CertificateRequest,
        key: &PrivateKey,
        issuer_cert: &Certificate,
        valid_until: DateTime<Tz>,
    ) -> Result<Certificate> {
        self.issuer.issue_until(csr, key, issuer_cert, valid_until)
    }

    /// Issue from an encoded request, decoded by the configured loader
    pub fn sign_certificate_encoded(
        &self,
        csr: &[u8],
        key: &PrivateKey,
        issuer_cert: &Certificate,
    ) -> Result<Certificate> {
        self.issuer.issue_encoded(csr, key, issuer_cert)
    }
}

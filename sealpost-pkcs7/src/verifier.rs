//! Signed-Data verification
//!
//! # Failure is a value, not an error
//!
//! [`Verifier::verify`] does **not** return `Err` when a signature fails to
//! verify. It returns [`Verification::Unverified`] carrying the structure
//! back to the caller. Callers must match on the outcome; treating `Ok(_)`
//! as success accepts forged or tampered data. Use
//! [`Verifier::verify_strict`] where a failed signature should abort.

use std::sync::Arc;

use openssl::stack::Stack;
use openssl::x509::X509;
use sealpost_common::logging::Logger;

use crate::config::VerifyMode;
use crate::error::{Pkcs7Error, Result};
use crate::material::Certificate;
use crate::pkcs7::SignedData;
use crate::trust::TrustStore;

/// Outcome of a signature check
#[must_use = "an Unverified outcome must not be treated as success"]
#[derive(Debug)]
pub enum Verification {
    /// Signature verified; the original payload
    Verified(Vec<u8>),
    /// Signature did not verify; the untouched structure
    Unverified(SignedData),
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified(_))
    }

    /// Payload, only when verified
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Verification::Verified(payload) => Some(payload),
            Verification::Unverified(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            Verification::Verified(payload) => Some(payload),
            Verification::Unverified(_) => None,
        }
    }

    /// Collapse into a `Result`, turning an unverified outcome into
    /// [`Pkcs7Error::VerificationFailed`]
    pub fn into_result(self) -> Result<Vec<u8>> {
        match self {
            Verification::Verified(payload) => Ok(payload),
            Verification::Unverified(signed) => Err(Pkcs7Error::VerificationFailed(format!(
                "Signature over {} byte structure did not verify",
                signed.len()
            ))),
        }
    }
}

/// Checks Signed-Data against a caller-supplied certificate
#[derive(Debug, Clone)]
pub struct Verifier {
    mode: VerifyMode,
    logger: Arc<Logger>,
}

impl Verifier {
    pub fn new(mode: VerifyMode, logger: Arc<Logger>) -> Self {
        Self { mode, logger }
    }

    pub fn mode(&self) -> VerifyMode {
        self.mode
    }

    /// Verify `signed_data` as signed by `signer_cert`.
    ///
    /// `Err` is reserved for failures to run the check at all; a bad
    /// signature yields `Ok(Verification::Unverified(..))`.
    pub fn verify(
        &self,
        signed_data: SignedData,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        let mut signers = Stack::<X509>::new()?;
        signers.push(signer_cert.x509().to_owned())?;

        let mut payload = Vec::new();
        let outcome = signed_data.pkcs7().verify(
            &signers,
            trust_store.x509_store(),
            None,
            Some(&mut payload),
            self.mode.flags(),
        );

        match outcome {
            Ok(()) => {
                self.logger.debug(format!(
                    "Verified {} byte payload signed by {}",
                    payload.len(),
                    signer_cert.fingerprint()
                ));
                Ok(Verification::Verified(payload))
            }
            Err(e) => {
                self.logger.warn(format!(
                    "Signature by {} did not verify: {e}",
                    signer_cert.fingerprint()
                ));
                Ok(Verification::Unverified(signed_data))
            }
        }
    }

    /// Parse the DER form, then [`Verifier::verify`]
    pub fn verify_der(
        &self,
        der: &[u8],
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        let signed_data = SignedData::from_der(der)?;
        self.verify(signed_data, signer_cert, trust_store)
    }

    /// Like [`Verifier::verify`] but a failed signature is an error
    pub fn verify_strict(
        &self,
        signed_data: SignedData,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Vec<u8>> {
        self.verify(signed_data, signer_cert, trust_store)?
            .into_result()
    }
}

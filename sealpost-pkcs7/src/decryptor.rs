//! Enveloped-Data unwrapping followed by verification

use std::sync::Arc;

use openssl::pkcs7::Pkcs7Flags;
use sealpost_common::logging::Logger;

use crate::error::{Pkcs7Error, Result};
use crate::material::{Certificate, PrivateKey};
use crate::pkcs7::{EnvelopedData, SignedData};
use crate::trust::TrustStore;
use crate::verifier::{Verification, Verifier};

#[derive(Debug, Clone)]
pub struct Decryptor {
    verifier: Verifier,
    logger: Arc<Logger>,
}

impl Decryptor {
    pub fn new(verifier: Verifier, logger: Arc<Logger>) -> Self {
        Self { verifier, logger }
    }

    /// Recover the content of `enveloped` using the recipient's key pair.
    ///
    /// Every failure (key/certificate mismatch, no recipient entry for the
    /// certificate, bad padding, corrupted ciphertext) is a
    /// [`Pkcs7Error::DecryptionError`].
    pub fn decrypt(
        &self,
        enveloped: &EnvelopedData,
        recipient_key: &PrivateKey,
        recipient_cert: &Certificate,
    ) -> Result<Vec<u8>> {
        let key_matches = recipient_key
            .matches(recipient_cert)
            .map_err(|e| Pkcs7Error::DecryptionError(e.to_string()))?;
        if !key_matches {
            return Err(Pkcs7Error::DecryptionError(format!(
                "Recipient key does not match certificate {}",
                recipient_cert.subject()
            )));
        }

        let content = enveloped
            .pkcs7()
            .decrypt(recipient_key.pkey(), recipient_cert.x509(), Pkcs7Flags::empty())
            .map_err(|e| {
                Pkcs7Error::DecryptionError(format!(
                    "No decryptable recipient entry for {}: {e}",
                    recipient_cert.subject()
                ))
            })?;

        self.logger.debug(format!(
            "Unwrapped {} bytes for {}",
            content.len(),
            recipient_cert.fingerprint()
        ));
        Ok(content)
    }

    /// Unwrap, re-parse the content as Signed-Data and verify it.
    ///
    /// The verification outcome follows [`Verifier::verify`]: a bad
    /// signature is `Ok(Verification::Unverified(..))`, not an error.
    pub fn decrypt_and_verify(
        &self,
        enveloped: &EnvelopedData,
        recipient_key: &PrivateKey,
        recipient_cert: &Certificate,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        let content = self.decrypt(enveloped, recipient_key, recipient_cert)?;
        let signed_data = SignedData::from_der(&content)?;
        self.verifier.verify(signed_data, signer_cert, trust_store)
    }

    /// Parse the DER form, then [`Decryptor::decrypt_and_verify`]
    pub fn decrypt_and_verify_der(
        &self,
        der: &[u8],
        recipient_key: &PrivateKey,
        recipient_cert: &Certificate,
        signer_cert: &Certificate,
        trust_store: &dyn TrustStore,
    ) -> Result<Verification> {
        let enveloped = EnvelopedData::from_der(der)?;
        self.decrypt_and_verify(
            &enveloped,
            recipient_key,
            recipient_cert,
            signer_cert,
            trust_store,
        )
    }
}

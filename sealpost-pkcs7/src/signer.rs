//! Signed-Data production

use std::sync::Arc;

use openssl::pkcs7::Pkcs7;
use openssl::stack::Stack;
use openssl::x509::X509;
use sealpost_common::logging::Logger;

use crate::config::SignFlags;
use crate::error::{Pkcs7Error, Result};
use crate::material::{Certificate, PrivateKey};
use crate::pkcs7::SignedData;

/// Binds a payload to a signer certificate and signature
#[derive(Debug, Clone)]
pub struct Signer {
    flags: SignFlags,
    logger: Arc<Logger>,
}

impl Signer {
    pub fn new(flags: SignFlags, logger: Arc<Logger>) -> Self {
        Self { flags, logger }
    }

    pub fn flags(&self) -> SignFlags {
        self.flags
    }

    /// Sign `payload` with `signer_key`, embedding `signer_cert` and no
    /// further chain. The payload is always carried inside the structure.
    pub fn sign(
        &self,
        payload: &[u8],
        signer_key: &PrivateKey,
        signer_cert: &Certificate,
    ) -> Result<SignedData> {
        self.sign_with_flags(payload, signer_key, signer_cert, self.flags)
    }

    /// [`Signer::sign`] with flags overriding the configured ones for this call
    pub fn sign_with_flags(
        &self,
        payload: &[u8],
        signer_key: &PrivateKey,
        signer_cert: &Certificate,
        flags: SignFlags,
    ) -> Result<SignedData> {
        if !signer_key.matches(signer_cert)? {
            return Err(Pkcs7Error::InvalidKeyPair(format!(
                "Signing key does not match certificate {}",
                signer_cert.subject()
            )));
        }

        let extra_certs = Stack::<X509>::new()?;
        let pkcs7 = Pkcs7::sign(
            signer_cert.x509(),
            signer_key.pkey(),
            &extra_certs,
            payload,
            flags.effective(),
        )
        .map_err(|e| Pkcs7Error::InvalidKeyPair(format!("Signing failed: {e}")))?;

        let signed = SignedData::from_pkcs7(pkcs7)?;
        self.logger.debug(format!(
            "Signed {} byte payload as {} ({} bytes)",
            payload.len(),
            signer_cert.fingerprint(),
            signed.len()
        ));
        Ok(signed)
    }
}

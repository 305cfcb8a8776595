//! Enveloped-Data production
//!
//! A fresh content key is generated by the provider for every envelope; the
//! payload is encrypted under it and the key is wrapped for exactly one
//! recipient certificate.

use std::sync::Arc;

use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::Id;
use openssl::stack::Stack;
use openssl::x509::X509;
use sealpost_common::logging::Logger;

use crate::config::ContentCipher;
use crate::error::{Pkcs7Error, Result};
use crate::material::Certificate;
use crate::pkcs7::{EnvelopedData, SignedData};

/// Wraps payloads for a single recipient
#[derive(Debug, Clone)]
pub struct Enveloper {
    cipher: ContentCipher,
    logger: Arc<Logger>,
}

impl Enveloper {
    pub fn new(cipher: ContentCipher, logger: Arc<Logger>) -> Self {
        Self { cipher, logger }
    }

    pub fn cipher(&self) -> ContentCipher {
        self.cipher
    }

    /// Envelope the canonical encoding of `signed_data`
    pub fn envelope_signed(
        &self,
        signed_data: &SignedData,
        recipient_cert: &Certificate,
    ) -> Result<EnvelopedData> {
        self.envelope(signed_data.to_der(), recipient_cert)
    }

    /// Envelope an arbitrary payload for `recipient_cert`
    pub fn envelope(&self, payload: &[u8], recipient_cert: &Certificate) -> Result<EnvelopedData> {
        let recipient_key = recipient_cert.public_key().map_err(|e| {
            Pkcs7Error::EncryptionError(format!("Recipient public key unavailable: {e}"))
        })?;
        // PKCS#7 key transport is RSA only
        if recipient_key.id() != Id::RSA {
            return Err(Pkcs7Error::EncryptionError(format!(
                "Recipient key of {} cannot wrap a content key",
                recipient_cert.subject()
            )));
        }

        let mut recipients = Stack::<X509>::new()?;
        recipients.push(recipient_cert.x509().to_owned())?;

        // BINARY keeps the payload bytes exactly as given
        let pkcs7 = Pkcs7::encrypt(
            &recipients,
            payload,
            self.cipher.cipher(),
            Pkcs7Flags::BINARY,
        )
        .map_err(|e| Pkcs7Error::EncryptionError(format!("Envelope encryption failed: {e}")))?;

        let enveloped = EnvelopedData::from_pkcs7(pkcs7)?;
        self.logger.debug(format!(
            "Enveloped {} bytes with {} for {}",
            payload.len(),
            self.cipher,
            recipient_cert.fingerprint()
        ));
        Ok(enveloped)
    }
}

//! Trust anchors
//!
//! The PKCS#7 components treat the trust store as an opaque oracle: they hand
//! its provider store to signature verification and never inspect it.

use std::sync::Arc;

use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder, X509StoreRef};
use openssl::x509::{X509StoreContext, X509};
use sealpost_common::logging::{Component, Logger};

use crate::error::{Pkcs7Error, Result};
use crate::material::Certificate;

/// Validation oracle answering "is this certificate, given this chain, trusted"
pub trait TrustStore: Send + Sync {
    /// Provider store used during Signed-Data verification
    fn x509_store(&self) -> &X509StoreRef;

    fn is_trusted(&self, certificate: &Certificate, chain: &[Certificate]) -> Result<bool>;
}

/// Trust store backed by an in-memory list of anchor certificates
pub struct TrustAnchors {
    anchors: Vec<Certificate>,
    store: X509Store,
    logger: Arc<Logger>,
}

impl TrustAnchors {
    /// Create a store trusting `anchors`
    pub fn new(anchors: Vec<Certificate>) -> Result<Self> {
        let store = build_store(&anchors)?;
        Ok(Self {
            anchors,
            store,
            logger: Arc::new(Logger::new_root(Component::TrustStore, "trust")),
        })
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// A store with no anchors; nothing verifies until anchors are added
    pub fn empty() -> Result<Self> {
        Self::new(Vec::new())
    }

    pub fn add_anchor(&mut self, anchor: Certificate) -> Result<()> {
        if self.anchors.contains(&anchor) {
            return Ok(());
        }
        self.anchors.push(anchor);
        self.store = build_store(&self.anchors)?;
        Ok(())
    }

    pub fn anchors(&self) -> &[Certificate] {
        &self.anchors
    }
}

impl std::fmt::Debug for TrustAnchors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchors")
            .field(
                "anchors",
                &self.anchors.iter().map(|a| a.subject()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TrustStore for TrustAnchors {
    fn x509_store(&self) -> &X509StoreRef {
        &self.store
    }

    fn is_trusted(&self, certificate: &Certificate, chain: &[Certificate]) -> Result<bool> {
        let mut untrusted = Stack::<X509>::new()?;
        for link in chain {
            untrusted.push(link.x509().to_owned())?;
        }

        let mut context = X509StoreContext::new()?;
        let trusted = context
            .init(&self.store, certificate.x509(), &untrusted, |ctx| {
                ctx.verify_cert()
            })
            .map_err(|e| Pkcs7Error::TrustStoreError(format!("Chain validation failed: {e}")))?;

        if !trusted {
            self.logger.warn_args(format_args!(
                "Untrusted certificate {} ({})",
                certificate.subject(),
                certificate.fingerprint()
            ));
        }
        Ok(trusted)
    }
}

fn build_store(anchors: &[Certificate]) -> Result<X509Store> {
    let mut builder = X509StoreBuilder::new()
        .map_err(|e| Pkcs7Error::TrustStoreError(format!("Failed to create store: {e}")))?;
    for anchor in anchors {
        builder.add_cert(anchor.x509().to_owned()).map_err(|e| {
            Pkcs7Error::TrustStoreError(format!(
                "Failed to add anchor {}: {e}",
                anchor.subject()
            ))
        })?;
    }
    Ok(builder.build())
}

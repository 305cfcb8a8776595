//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use sealpost_common::logging::{Component, Logger};
use sealpost_pkcs7::{
    Certificate, CertificateDigest, CertificateRequest, Pkcs7Config, Pkcs7Workflow, PrivateKey,
    Result, TrustAnchors,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn create_test_logger(context: &str) -> Arc<Logger> {
    Arc::new(Logger::new_root(Component::Workflow, context))
}

pub fn workflow(config: Pkcs7Config) -> Result<Pkcs7Workflow> {
    init_logging();
    Pkcs7Workflow::new(config, create_test_logger("tests"))
}

/// RSA key plus self-signed CA certificate
pub fn rsa_identity(subject: &str) -> Result<(PrivateKey, Certificate)> {
    let key = PrivateKey::generate_rsa(2048)?;
    let cert = Certificate::self_signed(
        &key,
        subject,
        chrono::Duration::try_days(30).expect("days in range"),
        CertificateDigest::Sha256,
    )?;
    Ok((key, cert))
}

pub fn ec_identity(subject: &str) -> Result<(PrivateKey, Certificate)> {
    let key = PrivateKey::generate_ec_p256()?;
    let cert = Certificate::self_signed(
        &key,
        subject,
        chrono::Duration::try_days(30).expect("days in range"),
        CertificateDigest::Sha256,
    )?;
    Ok((key, cert))
}

pub fn trusting(certs: &[&Certificate]) -> Result<TrustAnchors> {
    TrustAnchors::new(certs.iter().map(|c| (*c).clone()).collect())
}

/// Fresh RSA key and a request for `subject`
pub fn rsa_request(subject: &str) -> Result<(PrivateKey, CertificateRequest)> {
    let key = PrivateKey::generate_rsa(2048)?;
    let csr = CertificateRequest::build(&key, subject, CertificateDigest::Sha256)?;
    Ok((key, csr))
}

/// Flip one bit inside the first occurrence of `needle` in `haystack`
pub fn flip_inside(haystack: &[u8], needle: &[u8]) -> Vec<u8> {
    let start = haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle present in encoding");
    let mut tampered = haystack.to_vec();
    tampered[start + needle.len() / 2] ^= 0x01;
    tampered
}

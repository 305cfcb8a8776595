//! End-to-end tests for the sign → envelope and unwrap → verify pipelines

mod common;

use std::sync::Arc;

use common::{ec_identity, flip_inside, rsa_identity, trusting, workflow};
use openssl::stack::Stack;
use openssl::x509::X509;
use sealpost_pkcs7::{
    ContentCipher, Pkcs7Config, Pkcs7Error, Pkcs7Flags, Result, SignedData, TrustAnchors,
    Verification,
};

#[test]
fn test_hello_world_same_identity_round_trip() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Alice,O=Sealpost,C=US")?;
    let trust = trusting(&[&cert])?;

    let enveloped = flow.sign_and_encrypt(b"hello world", &key, &cert, &cert)?;
    println!("Enveloped-Data: {} bytes", enveloped.len());

    let outcome = flow.decrypt_and_verify(&enveloped, &key, &cert, &cert, &trust)?;
    assert_eq!(outcome.payload(), Some(&b"hello world"[..]));
    Ok(())
}

#[test]
fn test_sign_verify_preserves_binary_payload() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Signer")?;
    let trust = trusting(&[&cert])?;

    let payload: Vec<u8> = b"line one\nline two\r\n\x00\xff tail".to_vec();
    let signed = flow.sign(&payload, &key, &cert)?;

    match flow.verify(signed, &cert, &trust)? {
        Verification::Verified(recovered) => assert_eq!(recovered, payload),
        Verification::Unverified(_) => panic!("valid signature must verify"),
    }
    Ok(())
}

#[test]
fn test_distinct_signer_and_recipient_over_der() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (signer_key, signer_cert) = rsa_identity("CN=Signer,O=Sender Org")?;
    let (recipient_key, recipient_cert) = rsa_identity("CN=Recipient,O=Receiver Org")?;
    let trust = trusting(&[&signer_cert])?;

    let payload = b"quarterly report";
    let wire = flow
        .sign_and_encrypt(payload, &signer_key, &signer_cert, &recipient_cert)?
        .into_der();
    println!("Envelope head: {}", hex::encode(&wire[..16]));

    let recovered = flow
        .decrypt_and_verify_der(&wire, &recipient_key, &recipient_cert, &signer_cert, &trust)?
        .into_payload();
    assert_eq!(recovered.as_deref(), Some(&payload[..]));
    Ok(())
}

#[test]
fn test_signed_data_embeds_exactly_the_signer_certificate() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Embedded")?;

    let signed = flow.sign(b"payload", &key, &cert)?;
    let none = Stack::<X509>::new()?;
    let embedded = signed.pkcs7().signers(&none, Pkcs7Flags::empty())?;

    assert_eq!(embedded.len(), 1);
    assert_eq!(embedded.get(0).map(|c| c.to_der()).transpose()?, Some(cert.der_bytes().to_vec()));
    Ok(())
}

#[test]
fn test_tampered_payload_is_returned_unverified() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Tamper")?;
    let trust = trusting(&[&cert])?;

    let payload = b"transfer 100 credits to account 4711";
    let signed = flow.sign(payload, &key, &cert)?;
    let tampered = flip_inside(signed.to_der(), payload);

    match flow.verify_der(&tampered, &cert, &trust)? {
        Verification::Verified(_) => panic!("tampered payload must not verify"),
        Verification::Unverified(structure) => {
            // The caller gets the exact structure back
            assert_eq!(structure.to_der(), &tampered[..]);
        }
    }

    let strict = flow.verify_strict(SignedData::from_der(&tampered)?, &cert, &trust);
    assert!(matches!(strict, Err(Pkcs7Error::VerificationFailed(_))));
    Ok(())
}

#[test]
fn test_wrong_signer_certificate_is_unverified() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Real Signer")?;
    let (_, impostor) = rsa_identity("CN=Impostor")?;
    let trust = trusting(&[&cert, &impostor])?;

    let signed = flow.sign(b"payload", &key, &cert)?;
    let expected = signed.to_der().to_vec();

    let outcome = flow.verify(signed, &impostor, &trust)?;
    assert!(!outcome.is_verified());
    match outcome {
        Verification::Unverified(structure) => assert_eq!(structure.to_der(), &expected[..]),
        Verification::Verified(_) => unreachable!(),
    }
    Ok(())
}

#[test]
fn test_decrypt_with_wrong_key_fails() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Sender")?;
    let (_, recipient_cert) = rsa_identity("CN=Intended Recipient")?;
    let (other_key, other_cert) = rsa_identity("CN=Eavesdropper")?;
    let trust = trusting(&[&cert])?;

    let enveloped = flow.sign_and_encrypt(b"secret", &key, &cert, &recipient_cert)?;

    // A consistent key pair that is not a recipient
    let result = flow.decrypt_and_verify(&enveloped, &other_key, &other_cert, &cert, &trust);
    assert!(matches!(result, Err(Pkcs7Error::DecryptionError(_))));

    // The recipient's certificate with a foreign key
    let result = flow.decrypt_and_verify(&enveloped, &other_key, &recipient_cert, &cert, &trust);
    assert!(matches!(result, Err(Pkcs7Error::DecryptionError(_))));
    Ok(())
}

#[test]
fn test_corrupted_ciphertext_fails_to_decrypt() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Corrupt")?;
    let trust = trusting(&[&cert])?;

    let mut wire = flow.sign_and_encrypt(b"payload", &key, &cert, &cert)?.into_der();
    // The encrypted content is the tail of the structure
    let last = wire.len() - 1;
    wire[last] ^= 0xff;
    wire[last - 1] ^= 0xff;

    let result = flow.decrypt_and_verify_der(&wire, &key, &cert, &cert, &trust);
    assert!(matches!(
        result,
        Err(Pkcs7Error::DecryptionError(_)) | Err(Pkcs7Error::InvalidFormat(_))
    ));
    Ok(())
}

#[test]
fn test_ec_recipient_cannot_receive_envelopes() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Sender")?;
    let (_, ec_cert) = ec_identity("CN=EC Recipient")?;

    let result = flow.sign_and_encrypt(b"payload", &key, &cert, &ec_cert);
    assert!(matches!(result, Err(Pkcs7Error::EncryptionError(_))));
    Ok(())
}

#[test]
fn test_ec_signer_to_rsa_recipient() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (signer_key, signer_cert) = ec_identity("CN=EC Signer")?;
    let (recipient_key, recipient_cert) = rsa_identity("CN=RSA Recipient")?;
    let mut trust = TrustAnchors::empty()?;
    trust.add_anchor(signer_cert.clone())?;

    let enveloped = flow.sign_and_encrypt(b"mixed", &signer_key, &signer_cert, &recipient_cert)?;
    let payload = flow
        .decrypt_and_verify_strict(&enveloped, &recipient_key, &recipient_cert, &signer_cert, &trust)?;
    assert_eq!(payload, b"mixed");
    Ok(())
}

#[test]
fn test_mismatched_signing_key_is_rejected() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (_, cert) = rsa_identity("CN=Owner")?;
    let (other_key, _) = rsa_identity("CN=Other")?;

    let result = flow.sign(b"payload", &other_key, &cert);
    assert!(matches!(result, Err(Pkcs7Error::InvalidKeyPair(_))));
    Ok(())
}

#[test]
fn test_malformed_inputs_are_invalid_format() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Format")?;
    let trust = trusting(&[&cert])?;

    assert!(matches!(
        flow.verify_der(b"definitely not pkcs7", &cert, &trust),
        Err(Pkcs7Error::InvalidFormat(_))
    ));
    assert!(matches!(
        flow.decrypt_and_verify_der(&[0x30, 0x80], &key, &cert, &cert, &trust),
        Err(Pkcs7Error::InvalidFormat(_))
    ));
    Ok(())
}

#[test]
fn test_envelope_of_non_signed_content_fails_verification_parse() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Raw")?;
    let trust = trusting(&[&cert])?;

    // The enveloper accepts arbitrary bytes; the decryptor expects Signed-Data inside
    let enveloped = flow.enveloper().envelope(b"raw bytes", &cert)?;
    assert_eq!(flow.decryptor().decrypt(&enveloped, &key, &cert)?, b"raw bytes");

    let result = flow.decrypt_and_verify(&enveloped, &key, &cert, &cert, &trust);
    assert!(matches!(result, Err(Pkcs7Error::InvalidFormat(_))));
    Ok(())
}

#[test]
fn test_alternative_content_ciphers() -> Result<()> {
    let (key, cert) = rsa_identity("CN=Cipher")?;
    let trust = trusting(&[&cert])?;

    for cipher in [ContentCipher::Aes128Cbc, ContentCipher::Aes192Cbc] {
        let flow = workflow(Pkcs7Config::default().with_cipher(cipher))?;
        let enveloped = flow.sign_and_encrypt(b"cipher choice", &key, &cert, &cert)?;
        let outcome = flow.decrypt_and_verify(&enveloped, &key, &cert, &cert, &trust)?;
        assert_eq!(outcome.into_payload().as_deref(), Some(&b"cipher choice"[..]));
    }
    Ok(())
}

#[test]
fn test_workflow_is_shareable_across_threads() -> Result<()> {
    let flow = Arc::new(workflow(Pkcs7Config::default())?);
    let (key, cert) = rsa_identity("CN=Concurrent")?;
    let trust = trusting(&[&cert])?;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let flow = Arc::clone(&flow);
                let (key, cert, trust) = (&key, &cert, &trust);
                scope.spawn(move || -> Result<bool> {
                    let payload = format!("message {i}");
                    let enveloped = flow.sign_and_encrypt(payload.as_bytes(), key, cert, cert)?;
                    let outcome = flow.decrypt_and_verify(&enveloped, key, cert, cert, trust)?;
                    Ok(outcome.payload() == Some(payload.as_bytes()))
                })
            })
            .collect();

        for handle in handles {
            let verified = handle.join().expect("worker thread panicked")?;
            assert!(verified);
        }
        Ok(())
    })
}

#[test]
fn test_per_call_flags_override_configuration() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Flags")?;
    let trust = trusting(&[&cert])?;

    // Detached is stripped; the payload stays embedded
    let flags = Pkcs7Flags::BINARY | Pkcs7Flags::DETACHED;
    let signed = flow.sign_with_flags(b"per call", &key, &cert, flags)?;
    assert_eq!(flow.verify_strict(signed, &cert, &trust)?, b"per call");

    let enveloped = flow.sign_and_encrypt_with_flags(b"per call", &key, &cert, &cert, flags)?;
    let payload = flow.decrypt_and_verify_strict(&enveloped, &key, &cert, &cert, &trust)?;
    assert_eq!(payload, b"per call");
    Ok(())
}

#[test]
fn test_nocerts_flag_still_embeds_the_signer_certificate() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=No Certs")?;
    let trust = trusting(&[&cert])?;

    let flags = Pkcs7Flags::BINARY | Pkcs7Flags::NOCERTS;
    let signed = flow.sign_with_flags(b"x", &key, &cert, flags)?;
    let none = Stack::<X509>::new()?;
    let embedded = signed.pkcs7().signers(&none, Pkcs7Flags::empty())?;
    assert_eq!(embedded.len(), 1);
    assert_eq!(embedded.get(0).map(|c| c.to_der()).transpose()?, Some(cert.der_bytes().to_vec()));

    assert_eq!(flow.verify_strict(signed, &cert, &trust)?, b"x");
    Ok(())
}

#[test]
fn test_empty_payload_round_trips() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (key, cert) = rsa_identity("CN=Empty")?;
    let trust = trusting(&[&cert])?;

    let signed = flow.sign(b"", &key, &cert)?;
    assert_eq!(flow.verify(signed, &cert, &trust)?.into_payload(), Some(Vec::new()));

    let enveloped = flow.sign_and_encrypt(b"", &key, &cert, &cert)?;
    let payload = flow.decrypt_and_verify_strict(&enveloped, &key, &cert, &cert, &trust)?;
    assert!(payload.is_empty());
    Ok(())
}

#[test]
fn test_multi_megabyte_payload_round_trips() -> Result<()> {
    let flow = workflow(Pkcs7Config::default())?;
    let (signer_key, signer_cert) = rsa_identity("CN=Bulk Sender")?;
    let (recipient_key, recipient_cert) = rsa_identity("CN=Bulk Recipient")?;
    let trust = trusting(&[&signer_cert])?;

    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let wire = flow
        .sign_and_encrypt(&payload, &signer_key, &signer_cert, &recipient_cert)?
        .into_der();
    println!("3 MiB payload enveloped into {} bytes", wire.len());

    let outcome =
        flow.decrypt_and_verify_der(&wire, &recipient_key, &recipient_cert, &signer_cert, &trust)?;
    assert!(outcome.is_verified());
    assert_eq!(outcome.into_payload(), Some(payload));
    Ok(())
}

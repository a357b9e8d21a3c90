//! One signature verification, from Init to Final.
//!
//! A session only exists once every Init check has passed; the checks run in
//! a fixed order and the first failure wins. Final consumes the session.

use crate::chain::ChainValidator;
use crate::config::VerifierConfig;
use crate::digest::{DigestAlgorithm, Hasher};
use crate::error::VerifyError;
use crate::keys::SignerKey;
use crate::pkcs7::SignedEnvelope;
use crate::signing_time::SigningTime;
use der::Encode;
use rustls_pki_types::CertificateDer;

/// An active verification: the parsed envelope plus the running digest.
pub struct VerificationSession {
    correlation_id: String,
    envelope: SignedEnvelope,
    signer_cert: usize,
    signer_subject: String,
    hasher: Hasher,
    signing_time: SigningTime,
    bytes_hashed: u64,
}

impl VerificationSession {
    /// Run every Init check and prime the digest.
    pub fn open(
        correlation_id: String,
        signature_pem: &[u8],
        validator: &ChainValidator,
        reference: Option<SigningTime>,
        config: &VerifierConfig,
    ) -> Result<Self, VerifyError> {
        let envelope = SignedEnvelope::from_pem(signature_pem)?;
        let signer = envelope.signer_info()?;

        let signer_cert = envelope.find_signer_certificate(signer).ok_or_else(|| {
            VerifyError::InvalidPkcs7("signer certificate not found in envelope".to_string())
        })?;
        let signer_der = envelope.certificate_der(signer_cert)?;

        let intermediates = if config.use_embedded_intermediates {
            (0..envelope.certificates().len())
                .filter(|&i| i != signer_cert)
                .map(|i| envelope.certificate_der(i).map(CertificateDer::from))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };
        validator.validate(
            &signer_der,
            &intermediates,
            config.time_source.validation_time(),
        )?;

        envelope.signed_attrs_der(signer)?;

        let signing_time = envelope.signing_time(signer)?;
        if let Some(reference) = reference {
            if signing_time < reference {
                return Err(VerifyError::SigningTimeRollback {
                    signing_time,
                    reference,
                });
            }
        }

        let digest_oid = signer.digest_alg.oid;
        let algorithm = DigestAlgorithm::from_oid(&digest_oid).ok_or_else(|| {
            log::warn!("Unsupported digest algorithm {}", digest_oid);
            VerifyError::BadArgs
        })?;

        let signer_subject = envelope
            .certificates()
            .get(signer_cert)
            .map(|cert| cert.tbs_certificate.subject.to_string())
            .unwrap_or_default();
        log::debug!(
            "Session {} opened: signer \"{}\", {}, signed at {}",
            correlation_id,
            signer_subject,
            algorithm.name(),
            signing_time
        );

        Ok(VerificationSession {
            correlation_id,
            envelope,
            signer_cert,
            signer_subject,
            hasher: Hasher::new(algorithm),
            signing_time,
            bytes_hashed: 0,
        })
    }

    /// Feed the next chunk of signed content.
    pub fn update(&mut self, data: &[u8]) -> Result<(), VerifyError> {
        if data.is_empty() {
            return Err(VerifyError::BadArgs);
        }
        self.hasher.update(data);
        self.bytes_hashed += data.len() as u64;
        Ok(())
    }

    /// Finish the digest and check it, then the signature.
    pub fn finish(mut self) -> Result<(), VerifyError> {
        let computed = self.hasher.finalize_reset();
        let algorithm = self.hasher.algorithm();

        let signer = self.envelope.signer_info()?;
        let embedded = self.envelope.message_digest(signer)?;
        if computed != embedded {
            log::debug!(
                "Session {}: computed {} digest {} != signed {}",
                self.correlation_id,
                algorithm.name(),
                hex::encode(&computed),
                hex::encode(&embedded)
            );
            return Err(VerifyError::DigestMismatch);
        }

        let signed_attrs = self.envelope.signed_attrs_der(signer)?;
        let prehash = algorithm.digest(&signed_attrs);

        let key = self.signer_key()?;
        let signature_algorithm = signer.signature_algorithm.oid;
        if !key.verify(
            algorithm,
            &prehash,
            signer.signature.as_bytes(),
            &signature_algorithm,
        ) {
            log::debug!(
                "Session {}: {} signature ({}) rejected",
                self.correlation_id,
                key.algorithm_name(),
                signature_algorithm
            );
            return Err(VerifyError::SignatureMismatch);
        }
        Ok(())
    }

    fn signer_key(&self) -> Result<SignerKey, VerifyError> {
        let cert = self
            .envelope
            .certificates()
            .get(self.signer_cert)
            .ok_or_else(|| VerifyError::InvalidPkcs7("signer certificate vanished".to_string()))?;
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| VerifyError::InvalidPkcs7(format!("signer public key: {e}")))?;
        SignerKey::from_spki_der(&spki).map_err(|e| {
            log::warn!("Session {}: unusable signer key: {}", self.correlation_id, e);
            VerifyError::SignatureMismatch
        })
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn signing_time(&self) -> SigningTime {
        self.signing_time
    }

    pub fn signer_subject(&self) -> &str {
        &self.signer_subject
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.hasher.algorithm()
    }

    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedTimeSource;
    use std::sync::Arc;

    const HELLO: &[u8] = include_bytes!("../tests/data/hello.p7.pem");
    const ROOT_CA: &[u8] = include_bytes!("../tests/data/root-ca.pem");

    fn config() -> VerifierConfig {
        // 2030-01-01T00:00:00Z
        VerifierConfig::default()
            .with_time_source(Arc::new(FixedTimeSource::from_unix_secs(1_893_456_000)))
    }

    fn open(reference: Option<SigningTime>) -> Result<VerificationSession, VerifyError> {
        let validator = ChainValidator::from_pem(ROOT_CA).unwrap();
        VerificationSession::open("test".to_string(), HELLO, &validator, reference, &config())
    }

    #[test]
    fn test_open_update_finish() {
        let mut session = open(None).unwrap();
        assert_eq!(session.correlation_id(), "test");
        assert_eq!(
            session.signing_time(),
            SigningTime::new(2021, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(session.signer_subject().contains("Firmware Signer"));
        assert_eq!(session.digest_algorithm(), DigestAlgorithm::Sha256);

        session.update(b"hello ").unwrap();
        session.update(b"world").unwrap();
        assert_eq!(session.bytes_hashed(), 11);
        session.finish().unwrap();
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut session = open(None).unwrap();
        assert!(matches!(session.update(b""), Err(VerifyError::BadArgs)));
    }

    #[test]
    fn test_digest_mismatch() {
        let mut session = open(None).unwrap();
        session.update(b"hello worle").unwrap();
        assert!(matches!(session.finish(), Err(VerifyError::DigestMismatch)));

        let session = open(None).unwrap();
        assert!(matches!(session.finish(), Err(VerifyError::DigestMismatch)));
    }

    #[test]
    fn test_rollback_boundary() {
        let signed_at = SigningTime::new(2021, 1, 1, 0, 0, 0).unwrap();
        assert!(open(Some(signed_at)).is_ok());
        assert!(open(Some(SigningTime::new(2020, 1, 1, 0, 0, 0).unwrap())).is_ok());

        let later = SigningTime::new(2021, 1, 1, 0, 0, 1).unwrap();
        match open(Some(later)) {
            Err(VerifyError::SigningTimeRollback {
                signing_time,
                reference,
            }) => {
                assert_eq!(signing_time, signed_at);
                assert_eq!(reference, later);
            }
            other => panic!("expected rollback, got {:?}", other.err()),
        }
    }
}

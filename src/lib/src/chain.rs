//! Certificate path validation against a single caller-supplied root.
//!
//! The trust store holds exactly one anchor: the root CA passed to Init.
//! Certificates embedded in the envelope may be offered as untrusted
//! intermediates; they never become anchors themselves.

use crate::armor;
use crate::error::VerifyError;
use crate::oid::EKU_CODE_SIGNING;
use rustls_pki_types::{CertificateDer, TrustAnchor, UnixTime};
use webpki::{EndEntityCert, KeyUsage};
use x509_parser::prelude::*;

/// One-anchor path validator.
pub struct ChainValidator {
    root_anchor: TrustAnchor<'static>,
    root_subject: String,
}

impl ChainValidator {
    /// Build the validator from a PEM (or DER) root certificate.
    pub fn from_pem(root_ca: &[u8]) -> Result<Self, VerifyError> {
        let der =
            armor::decode(root_ca, armor::CERTIFICATE_LABELS).map_err(VerifyError::InvalidX509)?;
        Self::from_der(&der)
    }

    pub fn from_der(root_der: &[u8]) -> Result<Self, VerifyError> {
        let (_, cert) = X509Certificate::from_der(root_der)
            .map_err(|e| VerifyError::InvalidX509(format!("Invalid root certificate: {e}")))?;
        let root_subject = cert.subject().to_string();

        let root_cert = CertificateDer::from(root_der);
        let root_anchor = webpki::anchor_from_trusted_cert(&root_cert)
            .map_err(|e| VerifyError::InvalidX509(format!("Invalid root certificate: {e:?}")))?
            .to_owned();

        Ok(ChainValidator {
            root_anchor,
            root_subject,
        })
    }

    /// Subject of the trusted root, for diagnostics.
    pub fn root_subject(&self) -> &str {
        &self.root_subject
    }

    /// Validate `signer_der` up to the root at `time`.
    ///
    /// The extended key usage, when the signer carries one, must include
    /// code signing. The validator's own error is surfaced verbatim in
    /// `CaVerificationFailed`.
    pub fn validate(
        &self,
        signer_der: &[u8],
        intermediates: &[CertificateDer<'_>],
        time: UnixTime,
    ) -> Result<(), VerifyError> {
        let signer = CertificateDer::from(signer_der);
        let cert = EndEntityCert::try_from(&signer).map_err(|e| {
            VerifyError::CaVerificationFailed(format!("Invalid signer certificate: {e:?}"))
        })?;

        cert.verify_for_usage(
            webpki::ALL_VERIFICATION_ALGS,
            std::slice::from_ref(&self.root_anchor),
            intermediates,
            time,
            KeyUsage::required_if_present(EKU_CODE_SIGNING),
            None,
            None,
        )
        .map_err(|e| VerifyError::CaVerificationFailed(format!("{e:?}")))?;

        log::debug!("signer certificate chains to {}", self.root_subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkcs7::SignedEnvelope;
    use std::time::Duration;

    const ROOT_CA: &[u8] = include_bytes!("../tests/data/root-ca.pem");
    const OTHER_ROOT_CA: &[u8] = include_bytes!("../tests/data/other-root-ca.pem");

    // 2030-01-01T00:00:00Z
    fn in_validity() -> UnixTime {
        UnixTime::since_unix_epoch(Duration::from_secs(1_893_456_000))
    }

    fn signer_der(envelope: &[u8]) -> Vec<u8> {
        let envelope = SignedEnvelope::from_pem(envelope).unwrap();
        let signer = envelope.signer_info().unwrap();
        let index = envelope.find_signer_certificate(signer).unwrap();
        envelope.certificate_der(index).unwrap()
    }

    #[test]
    fn test_direct_chain() {
        let validator = ChainValidator::from_pem(ROOT_CA).unwrap();
        assert!(validator.root_subject().contains("Test Root CA"));

        let signer = signer_der(include_bytes!("../tests/data/hello.p7.pem"));
        validator.validate(&signer, &[], in_validity()).unwrap();
    }

    #[test]
    fn test_wrong_root() {
        let validator = ChainValidator::from_pem(OTHER_ROOT_CA).unwrap();
        let signer = signer_der(include_bytes!("../tests/data/hello.p7.pem"));
        let err = validator.validate(&signer, &[], in_validity()).unwrap_err();
        assert!(matches!(err, VerifyError::CaVerificationFailed(_)));
    }

    #[test]
    fn test_outside_validity() {
        let validator = ChainValidator::from_pem(ROOT_CA).unwrap();
        let signer = signer_der(include_bytes!("../tests/data/hello.p7.pem"));
        // 2000-01-01T00:00:00Z
        let before = UnixTime::since_unix_epoch(Duration::from_secs(946_684_800));
        let err = validator.validate(&signer, &[], before).unwrap_err();
        assert!(matches!(err, VerifyError::CaVerificationFailed(_)));
    }

    #[test]
    fn test_intermediate_chain() {
        let validator = ChainValidator::from_pem(ROOT_CA).unwrap();
        let envelope =
            SignedEnvelope::from_pem(include_bytes!("../tests/data/intermediate.p7.pem")).unwrap();
        let signer = envelope.signer_info().unwrap();
        let index = envelope.find_signer_certificate(signer).unwrap();
        let signer_der = envelope.certificate_der(index).unwrap();

        let err = validator.validate(&signer_der, &[], in_validity()).unwrap_err();
        assert!(matches!(err, VerifyError::CaVerificationFailed(_)));

        let intermediates: Vec<CertificateDer<'static>> = (0..envelope.certificates().len())
            .filter(|i| *i != index)
            .map(|i| CertificateDer::from(envelope.certificate_der(i).unwrap()))
            .collect();
        validator
            .validate(&signer_der, &intermediates, in_validity())
            .unwrap();
    }

    #[test]
    fn test_invalid_root() {
        assert!(matches!(
            ChainValidator::from_pem(b"garbage"),
            Err(VerifyError::InvalidX509(_))
        ));
        let pem = b"-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
        assert!(matches!(
            ChainValidator::from_pem(pem),
            Err(VerifyError::InvalidX509(_))
        ));
    }
}

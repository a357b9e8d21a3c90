//! Certificate inspection helpers.
//!
//! This is the extraction side of the crate: it reads the identifying fields
//! and the public key out of a certificate without validating anything.

use crate::armor;
use crate::error::KeyError;
use crate::keys::SignerKey;
use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

/// Fields extracted from an X.509 certificate.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Serial number, big-endian, as encoded.
    pub serial: Vec<u8>,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Dotted OID of the SubjectPublicKeyInfo algorithm.
    pub key_algorithm: String,
    spki_der: Vec<u8>,
}

impl CertificateInfo {
    /// Parse a PEM certificate (DER input is accepted as well).
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        let der = armor::decode(pem, armor::CERTIFICATE_LABELS).map_err(KeyError::InvalidCertificate)?;
        Self::from_der(&der)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| KeyError::InvalidCertificate(format!("Failed to parse X.509 certificate: {e}")))?;

        let validity = cert.validity();
        Ok(CertificateInfo {
            serial: cert.raw_serial().to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before: to_utc(validity.not_before.timestamp())?,
            not_after: to_utc(validity.not_after.timestamp())?,
            key_algorithm: cert.public_key().algorithm.algorithm.to_id_string(),
            spki_der: cert.public_key().raw.to_vec(),
        })
    }

    /// Serial number as lowercase hex.
    pub fn serial_hex(&self) -> String {
        hex::encode(&self.serial)
    }

    /// Decode the certificate's public key.
    pub fn public_key(&self) -> Result<SignerKey, KeyError> {
        SignerKey::from_spki_der(&self.spki_der)
    }

    /// Whether `at` falls inside the validity window.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, KeyError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| KeyError::InvalidCertificate(format!("validity time {timestamp} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{EcPublicKey, NamedCurve};
    use chrono::TimeZone;

    const ROOT_CA: &[u8] = include_bytes!("../tests/data/root-ca.pem");

    #[test]
    fn test_root_ca_fields() {
        let info = CertificateInfo::from_pem(ROOT_CA).unwrap();
        assert_eq!(info.serial_hex(), "01");
        assert!(info.subject.contains("CN=Test Root CA"));
        assert_eq!(info.subject, info.issuer);
        assert_eq!(info.key_algorithm, "1.2.840.10045.2.1");
        assert!(info.not_before < info.not_after);
        assert!(info.is_valid_at(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
        assert!(!info.is_valid_at(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_public_key_extraction() {
        let info = CertificateInfo::from_pem(ROOT_CA).unwrap();
        let key = info.public_key().unwrap();
        assert_eq!(key.algorithm_name(), "ecdsa-p256");

        let SignerKey::Ec(ec) = key else {
            panic!("expected an EC key");
        };
        assert_eq!(ec.curve(), NamedCurve::P256);
        let point = ec.to_uncompressed_point();
        assert_eq!(point.len(), 65);
        assert_eq!(point[0], 0x04);

        let rebuilt = EcPublicKey::from_uncompressed_point(&point, &NamedCurve::P256.oid()).unwrap();
        assert_eq!(rebuilt, ec);
    }

    #[test]
    fn test_rejects_non_certificates() {
        let err = CertificateInfo::from_pem(b"not a certificate").unwrap_err();
        assert!(matches!(err, KeyError::InvalidCertificate(_)));

        let envelope = include_bytes!("../tests/data/hello.p7.pem");
        let err = CertificateInfo::from_pem(envelope).unwrap_err();
        assert!(matches!(err, KeyError::InvalidCertificate(_)));
    }
}

//! PKCS#7 / CMS signed-data envelopes.
//!
//! [`SignedEnvelope`] owns the decoded `SignedData` and exposes the pieces the
//! verifier needs: the single SignerInfo, the embedded certificates, and the
//! authenticated attributes (signing time, message digest, and their DER
//! encoding for the signature check).
//!
//! Envelopes must be DER. BER indefinite-length output (`openssl smime
//! -stream`) is rejected as malformed.

use crate::armor;
use crate::error::VerifyError;
use crate::oid;
use crate::signing_time::SigningTime;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{Any, ObjectIdentifier};
use der::{Decode, Encode, Tag, Tagged};
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::Certificate;

/// A decoded signed-data envelope.
pub struct SignedEnvelope {
    signed_data: SignedData,
    certificates: Vec<Certificate>,
}

impl SignedEnvelope {
    /// Decode a PEM (or raw DER) envelope.
    pub fn from_pem(input: &[u8]) -> Result<Self, VerifyError> {
        let der = armor::decode(input, armor::PKCS7_LABELS).map_err(VerifyError::InvalidPkcs7)?;
        Self::from_der(&der)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, VerifyError> {
        let content_info = ContentInfo::from_der(der)
            .map_err(|e| VerifyError::InvalidPkcs7(format!("ContentInfo: {e}")))?;

        if content_info.content_type != oid::ID_SIGNED_DATA {
            return Err(VerifyError::InvalidPkcs7(format!(
                "content type {} is not signedData",
                content_info.content_type
            )));
        }

        let content = content_info
            .content
            .to_der()
            .map_err(|e| VerifyError::InvalidPkcs7(format!("SignedData: {e}")))?;
        let signed_data = SignedData::from_der(&content)
            .map_err(|e| VerifyError::InvalidPkcs7(format!("SignedData: {e}")))?;

        // Attribute and other certificate formats are carried but never used.
        let certificates = signed_data
            .certificates
            .as_ref()
            .map(|set| {
                set.0
                    .iter()
                    .filter_map(|choice| match choice {
                        CertificateChoices::Certificate(cert) => Some(cert.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SignedEnvelope {
            signed_data,
            certificates,
        })
    }

    /// Number of SignerInfo entries.
    pub fn signer_count(&self) -> usize {
        self.signed_data.signer_infos.0.len()
    }

    /// The envelope's only SignerInfo.
    ///
    /// No signers is a malformed envelope; several signers are rejected as
    /// unsupported rather than checking just one of them.
    pub fn signer_info(&self) -> Result<&SignerInfo, VerifyError> {
        let mut signers = self.signed_data.signer_infos.0.iter();
        match (signers.next(), signers.next()) {
            (None, _) => Err(VerifyError::InvalidPkcs7("no SignerInfo".to_string())),
            (Some(signer), None) => Ok(signer),
            (Some(_), Some(_)) => Err(VerifyError::NotSupported(format!(
                "{} signers in one envelope",
                self.signer_count()
            ))),
        }
    }

    /// X.509 certificates embedded in the envelope.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Index of the certificate named by `signer`'s SignerIdentifier.
    pub fn find_signer_certificate(&self, signer: &SignerInfo) -> Option<usize> {
        self.certificates.iter().position(|cert| match &signer.sid {
            SignerIdentifier::IssuerAndSerialNumber(id) => {
                cert.tbs_certificate.issuer == id.issuer
                    && cert.tbs_certificate.serial_number == id.serial_number
            }
            SignerIdentifier::SubjectKeyIdentifier(ski) => subject_key_identifier(cert)
                .is_some_and(|own| own.0.as_bytes() == ski.0.as_bytes()),
        })
    }

    /// DER of the embedded certificate at `index`.
    pub fn certificate_der(&self, index: usize) -> Result<Vec<u8>, VerifyError> {
        let cert = self
            .certificates
            .get(index)
            .ok_or_else(|| VerifyError::InvalidPkcs7(format!("no certificate #{index}")))?;
        cert.to_der()
            .map_err(|e| VerifyError::InvalidPkcs7(format!("certificate #{index}: {e}")))
    }

    /// The canonical DER of the signed attributes, as covered by the
    /// signature (SET OF, not the `[0] IMPLICIT` form used in transit).
    pub fn signed_attrs_der(&self, signer: &SignerInfo) -> Result<Vec<u8>, VerifyError> {
        let attrs = signer
            .signed_attrs
            .as_ref()
            .filter(|attrs| !attrs.is_empty())
            .ok_or_else(|| VerifyError::InvalidPkcs7("no authenticated attributes".to_string()))?;
        attrs
            .to_der()
            .map_err(|e| VerifyError::InvalidPkcs7(format!("authenticated attributes: {e}")))
    }

    /// Read and parse the PKCS#9 signing-time attribute.
    pub fn signing_time(&self, signer: &SignerInfo) -> Result<SigningTime, VerifyError> {
        let value = signed_attribute(signer, oid::ID_SIGNING_TIME)?
            .ok_or_else(|| VerifyError::InvalidPkcs7("signing-time attribute missing".to_string()))?;

        let text = std::str::from_utf8(value.value())
            .map_err(|_| VerifyError::InvalidPkcs7("signing time is not ASCII".to_string()))?;
        let parsed = match value.tag() {
            Tag::UtcTime => SigningTime::from_utc_time(text),
            Tag::GeneralizedTime => SigningTime::from_generalized_time(text),
            other => {
                return Err(VerifyError::InvalidPkcs7(format!(
                    "signing time has unexpected tag {other}"
                )))
            }
        };
        parsed.map_err(|e| VerifyError::InvalidPkcs7(format!("signing time: {e}")))
    }

    /// The PKCS#9 message-digest attribute's octets.
    pub fn message_digest(&self, signer: &SignerInfo) -> Result<Vec<u8>, VerifyError> {
        let value = signed_attribute(signer, oid::ID_MESSAGE_DIGEST)?.ok_or_else(|| {
            VerifyError::InvalidPkcs7("message-digest attribute missing".to_string())
        })?;
        if value.tag() != Tag::OctetString {
            return Err(VerifyError::InvalidPkcs7(format!(
                "message digest has unexpected tag {}",
                value.tag()
            )));
        }
        Ok(value.value().to_vec())
    }
}

/// The single value of the authenticated attribute `attr_oid`, if present.
fn signed_attribute(
    signer: &SignerInfo,
    attr_oid: ObjectIdentifier,
) -> Result<Option<&Any>, VerifyError> {
    let Some(attrs) = signer.signed_attrs.as_ref() else {
        return Ok(None);
    };
    let Some(attr) = attrs.iter().find(|attr| attr.oid == attr_oid) else {
        return Ok(None);
    };
    let mut values = attr.values.iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(Some(value)),
        _ => Err(VerifyError::InvalidPkcs7(format!(
            "attribute {attr_oid} must have exactly one value"
        ))),
    }
}

fn subject_key_identifier(cert: &Certificate) -> Option<SubjectKeyIdentifier> {
    cert.tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == oid::ID_CE_SUBJECT_KEY_IDENTIFIER)
        .and_then(|ext| SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()).ok())
}

//! Signer public keys.
//!
//! Keys arrive either as a certificate's SubjectPublicKeyInfo or, for the
//! extraction helpers, as a raw uncompressed EC point plus a curve OID.
//! Signature checks operate on a prehashed message: the caller has already
//! run the signer's declared digest over the signed attributes.

use crate::digest::DigestAlgorithm;
use crate::error::KeyError;
use crate::oid;
use der::asn1::ObjectIdentifier;
use ecdsa::signature::hazmat::PrehashVerifier;
use elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};

/// Leading octet of an uncompressed SEC1 point.
const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Named curves understood by the reconstructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    P256,
    P384,
}

impl NamedCurve {
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == oid::SECP256R1 {
            Some(NamedCurve::P256)
        } else if *oid == oid::SECP384R1 {
            Some(NamedCurve::P384)
        } else {
            None
        }
    }

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            NamedCurve::P256 => oid::SECP256R1,
            NamedCurve::P384 => oid::SECP384R1,
        }
    }

    /// Length in bytes of one affine coordinate.
    pub fn coordinate_len(&self) -> usize {
        match self {
            NamedCurve::P256 => 32,
            NamedCurve::P384 => 48,
        }
    }
}

/// An elliptic-curve public key on a supported named curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

impl EcPublicKey {
    /// Rebuild a key from `0x04 || X || Y` and the curve's OID.
    ///
    /// Malformed encodings and unknown curves are `InvalidKeyEncoding`; a
    /// point that is not on the curve is `KeyConstructionFailed`.
    pub fn from_uncompressed_point(
        point: &[u8],
        curve: &ObjectIdentifier,
    ) -> Result<Self, KeyError> {
        if point.is_empty() {
            return Err(KeyError::InvalidKeyEncoding("empty point".to_string()));
        }
        if point.len() % 2 == 0 {
            return Err(KeyError::InvalidKeyEncoding(format!(
                "point length {} is not 1 + 2N",
                point.len()
            )));
        }
        if point[0] != UNCOMPRESSED_POINT_TAG {
            return Err(KeyError::InvalidKeyEncoding(format!(
                "unsupported point format 0x{:02x}",
                point[0]
            )));
        }
        let named = NamedCurve::from_oid(curve)
            .ok_or_else(|| KeyError::InvalidKeyEncoding(format!("unknown curve {curve}")))?;

        let key = match named {
            NamedCurve::P256 => p256::PublicKey::from_sec1_bytes(point).map(EcPublicKey::P256),
            NamedCurve::P384 => p384::PublicKey::from_sec1_bytes(point).map(EcPublicKey::P384),
        };
        key.map_err(|e| KeyError::KeyConstructionFailed(format!("{named:?}: {e}")))
    }

    pub fn curve(&self) -> NamedCurve {
        match self {
            EcPublicKey::P256(_) => NamedCurve::P256,
            EcPublicKey::P384(_) => NamedCurve::P384,
        }
    }

    /// SEC1 uncompressed encoding, `0x04 || X || Y`.
    pub fn to_uncompressed_point(&self) -> Vec<u8> {
        match self {
            EcPublicKey::P256(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
            EcPublicKey::P384(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Affine `(X, Y)` coordinates, big-endian.
    pub fn affine_coordinates(&self) -> (Vec<u8>, Vec<u8>) {
        let point = self.to_uncompressed_point();
        let n = self.curve().coordinate_len();
        (point[1..1 + n].to_vec(), point[1 + n..].to_vec())
    }

    /// Check a DER-encoded ECDSA signature over a prehashed message.
    pub fn verify_prehash(&self, prehash: &[u8], signature_der: &[u8]) -> bool {
        match self {
            EcPublicKey::P256(pk) => {
                let Ok(sig) = p256::ecdsa::Signature::from_der(signature_der) else {
                    log::debug!("ECDSA signature is not valid DER");
                    return false;
                };
                p256::ecdsa::VerifyingKey::from(pk)
                    .verify_prehash(prehash, &sig)
                    .is_ok()
            }
            EcPublicKey::P384(pk) => {
                let Ok(sig) = p384::ecdsa::Signature::from_der(signature_der) else {
                    log::debug!("ECDSA signature is not valid DER");
                    return false;
                };
                p384::ecdsa::VerifyingKey::from(pk)
                    .verify_prehash(prehash, &sig)
                    .is_ok()
            }
        }
    }
}

/// The public key of a signer certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerKey {
    Ec(EcPublicKey),
    Rsa(RsaPublicKey),
}

impl SignerKey {
    /// Decode a DER SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, KeyError> {
        let spki = spki::SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| KeyError::InvalidKeyEncoding(e.to_string()))?;
        let algorithm = spki.algorithm.oid;

        if algorithm == oid::ID_EC_PUBLIC_KEY {
            let curve = spki
                .algorithm
                .parameters_oid()
                .map_err(|e| KeyError::InvalidKeyEncoding(format!("EC parameters: {e}")))?;
            let point = spki.subject_public_key.as_bytes().ok_or_else(|| {
                KeyError::InvalidKeyEncoding("EC point has unused bits".to_string())
            })?;
            EcPublicKey::from_uncompressed_point(point, &curve).map(SignerKey::Ec)
        } else if algorithm == oid::RSA_ENCRYPTION {
            RsaPublicKey::from_public_key_der(der)
                .map(SignerKey::Rsa)
                .map_err(|e| KeyError::KeyConstructionFailed(e.to_string()))
        } else {
            Err(KeyError::UnsupportedKeyType(algorithm.to_string()))
        }
    }

    pub fn algorithm_name(&self) -> &'static str {
        match self {
            SignerKey::Ec(EcPublicKey::P256(_)) => "ecdsa-p256",
            SignerKey::Ec(EcPublicKey::P384(_)) => "ecdsa-p384",
            SignerKey::Rsa(_) => "rsa",
        }
    }

    /// Verify `signature` over `prehash`.
    ///
    /// `signature_algorithm` is the SignerInfo's declared algorithm. It must
    /// fit the key type, and when it names a hash that hash must be `digest`.
    pub fn verify(
        &self,
        digest: DigestAlgorithm,
        prehash: &[u8],
        signature: &[u8],
        signature_algorithm: &ObjectIdentifier,
    ) -> bool {
        match self {
            SignerKey::Ec(key) => {
                let declared = if *signature_algorithm == oid::ID_EC_PUBLIC_KEY {
                    Some(digest)
                } else {
                    ecdsa_digest(signature_algorithm)
                };
                if declared != Some(digest) {
                    log::debug!(
                        "signature algorithm {signature_algorithm} does not fit an EC key with {}",
                        digest.name()
                    );
                    return false;
                }
                key.verify_prehash(prehash, signature)
            }
            SignerKey::Rsa(key) => {
                let declared = if *signature_algorithm == oid::RSA_ENCRYPTION {
                    Some(digest)
                } else {
                    rsa_digest(signature_algorithm)
                };
                if declared != Some(digest) {
                    log::debug!(
                        "signature algorithm {signature_algorithm} does not fit an RSA key with {}",
                        digest.name()
                    );
                    return false;
                }
                let scheme = match digest {
                    DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
                    DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
                    DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
                };
                key.verify(scheme, prehash, signature).is_ok()
            }
        }
    }
}

fn ecdsa_digest(oid: &ObjectIdentifier) -> Option<DigestAlgorithm> {
    if *oid == oid::ECDSA_WITH_SHA256 {
        Some(DigestAlgorithm::Sha256)
    } else if *oid == oid::ECDSA_WITH_SHA384 {
        Some(DigestAlgorithm::Sha384)
    } else if *oid == oid::ECDSA_WITH_SHA512 {
        Some(DigestAlgorithm::Sha512)
    } else {
        None
    }
}

fn rsa_digest(oid: &ObjectIdentifier) -> Option<DigestAlgorithm> {
    if *oid == oid::SHA256_WITH_RSA {
        Some(DigestAlgorithm::Sha256)
    } else if *oid == oid::SHA384_WITH_RSA {
        Some(DigestAlgorithm::Sha384)
    } else if *oid == oid::SHA512_WITH_RSA {
        Some(DigestAlgorithm::Sha512)
    } else {
        None
    }
}

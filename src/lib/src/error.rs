use crate::signing_time::SigningTime;

/// The verification error type.
///
/// Every failure is terminal for the session that produced it: by the time
/// one of these is returned, the session and everything it owned is gone.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid argument")]
    BadArgs,

    #[error("Invalid X.509 certificate: {0}")]
    InvalidX509(String),

    #[error("Invalid PKCS#7 structure: {0}")]
    InvalidPkcs7(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("CA verification failed: {0}")]
    CaVerificationFailed(String),

    #[error("Signing time {signing_time} is older than the reference time {reference}")]
    SigningTimeRollback {
        signing_time: SigningTime,
        reference: SigningTime,
    },

    #[error("Content digest does not match the signed message digest")]
    DigestMismatch,

    #[error("Signature does not match the signed attributes")]
    SignatureMismatch,
}

impl VerifyError {
    /// Stable identifier of the error kind, used for audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::BadArgs => "bad_args",
            VerifyError::InvalidX509(_) => "invalid_x509",
            VerifyError::InvalidPkcs7(_) => "invalid_pkcs7",
            VerifyError::NotSupported(_) => "not_supported",
            VerifyError::CaVerificationFailed(_) => "ca_verification_failed",
            VerifyError::SigningTimeRollback { .. } => "signing_time_rollback",
            VerifyError::DigestMismatch => "digest_mismatch",
            VerifyError::SignatureMismatch => "signature_mismatch",
        }
    }

    /// The signing time carried by the error, if the error has one.
    pub fn signing_time(&self) -> Option<SigningTime> {
        match self {
            VerifyError::SigningTimeRollback { signing_time, .. } => Some(*signing_time),
            _ => None,
        }
    }
}

/// Errors raised while parsing ASN.1 or reference timestamps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeFormatError {
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(&'static str),
}

/// Errors raised by the certificate/key extraction helpers.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("Public key construction failed: {0}")]
    KeyConstructionFailed(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Random number generation failed: {0}")]
    Random(String),
}

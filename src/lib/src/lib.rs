//! Incremental verification of detached PKCS#7 signatures.
//!
//! A signature is checked against a single caller-supplied root CA in three
//! phases: Init parses the envelope, validates the signer's certificate
//! chain and enforces the anti-rollback policy; Update streams the signed
//! content through the signer's digest; Final compares the digest and checks
//! the signature over the authenticated attributes.
//!
//! The crate also exposes the certificate inspection helpers the verifier is
//! built from (public key extraction, EC point reconstruction) and an OS
//! random source.

#![forbid(unsafe_code)]

mod error;
mod oid;

mod armor;
mod chain;
mod digest;
mod pkcs7;
mod registry;
mod session;
mod verifier;

/// Structured audit events for verification sessions
///
/// Emits `tracing` events under the `p7verify::audit` target, tagged with a
/// per-session correlation ID.
pub mod audit;

/// Verifier configuration
pub mod config;

/// Certificate field and public key extraction
pub mod certificate;

/// EC and RSA signer keys
pub mod keys;

/// OS random bytes
pub mod random;

/// Calendar timestamps from the signing-time attribute
pub mod signing_time;

/// Time source abstraction for certificate validity checks
///
/// Lets devices without a reliable clock supply their own notion of "now".
pub mod time;

pub use certificate::CertificateInfo;
pub use config::VerifierConfig;
pub use digest::{DigestAlgorithm, Hasher};
pub use error::*;
pub use keys::{EcPublicKey, NamedCurve, SignerKey};
pub use pkcs7::SignedEnvelope;
pub use random::random_bytes;
pub use registry::{SessionHandle, SessionRegistry};
pub use signing_time::SigningTime;
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
pub use verifier::{VerificationOutcome, Verifier, READ_CHUNK_SIZE};

pub mod reexports {
    pub use {cms, der, getrandom, log, thiserror, x509_cert};
}

//! The three-phase verification API.
//!
//! ```rust,ignore
//! use p7verify::{SigningTime, Verifier};
//!
//! let verifier = Verifier::new();
//! let reference = SigningTime::parse_reference("01/01/2020 00:00:00")?;
//! let (handle, signed_at) =
//!     verifier.verify_signature_init(signature_pem, root_ca_pem, Some(reference))?;
//! verifier.verify_signature_update(handle, b"hello ")?;
//! verifier.verify_signature_update(handle, b"world")?;
//! verifier.verify_signature_final(handle)?;
//! ```
//!
//! Any error ends the session: the handle is invalid afterwards and every
//! further call with it is `BadArgs`.

use crate::audit;
use crate::chain::ChainValidator;
use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::session::VerificationSession;
use crate::signing_time::SigningTime;
use std::io::Read;

/// Read size used by [`Verifier::verify_reader`].
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Result of [`Verifier::verify_reader`].
///
/// The signing time is reported whenever Init got far enough to parse it,
/// even if the verification then failed.
#[derive(Debug)]
pub struct VerificationOutcome {
    pub signing_time: Option<SigningTime>,
    pub result: Result<(), VerifyError>,
}

impl VerificationOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Signature verifier owning a registry of open sessions.
pub struct Verifier {
    config: VerifierConfig,
    sessions: SessionRegistry<VerificationSession>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::with_config(VerifierConfig::default())
    }

    pub fn with_config(config: VerifierConfig) -> Self {
        let sessions = SessionRegistry::new(config.max_sessions);
        Verifier { config, sessions }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Number of sessions between Init and Final/abort.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Parse the envelope, validate the signer and open a session.
    ///
    /// Checks run in this order, and the first failure is returned:
    /// input sizes, root CA, envelope and content type, signer count,
    /// signer certificate, chain, authenticated attributes, signing time,
    /// rollback, digest algorithm.
    pub fn verify_signature_init(
        &self,
        signature_pem: &[u8],
        root_ca_pem: &[u8],
        reference: Option<SigningTime>,
    ) -> Result<(SessionHandle, SigningTime), VerifyError> {
        let correlation_id = audit::new_correlation_id();
        let reference_display = reference.map(|r| r.to_string());

        let result = self.open_session(
            correlation_id.clone(),
            signature_pem,
            root_ca_pem,
            reference,
            reference_display.as_deref(),
        );
        match &result {
            Ok((handle, signing_time)) => {
                log::info!("Opened {} (signed at {})", handle, signing_time);
            }
            Err(VerifyError::SigningTimeRollback {
                signing_time,
                reference,
            }) => {
                log::warn!(
                    "Rejected stale signature: signed at {}, reference {}",
                    signing_time,
                    reference
                );
                audit::log_verification_rollback(
                    &correlation_id,
                    &signing_time.to_string(),
                    &reference.to_string(),
                );
            }
            Err(e) => {
                log::info!("Init failed: {}", e);
                audit::log_verification_failure(&correlation_id, "init", e.kind(), &e.to_string());
            }
        }
        result
    }

    fn open_session(
        &self,
        correlation_id: String,
        signature_pem: &[u8],
        root_ca_pem: &[u8],
        reference: Option<SigningTime>,
        reference_display: Option<&str>,
    ) -> Result<(SessionHandle, SigningTime), VerifyError> {
        let limit = self.config.max_signature_pem_len;
        if signature_pem.is_empty() || root_ca_pem.is_empty() {
            return Err(VerifyError::BadArgs);
        }
        if signature_pem.len() > limit || root_ca_pem.len() > limit {
            log::warn!("Input larger than the {} byte limit", limit);
            return Err(VerifyError::BadArgs);
        }

        let validator = ChainValidator::from_pem(root_ca_pem)?;
        audit::log_verification_attempt(&correlation_id, validator.root_subject(), reference_display);

        let session = VerificationSession::open(
            correlation_id,
            signature_pem,
            &validator,
            reference,
            &self.config,
        )?;
        let signing_time = session.signing_time();
        let handle = self.sessions.insert(session)?;
        Ok((handle, signing_time))
    }

    /// Feed the next chunk of content. An empty chunk is `BadArgs` and ends
    /// the session.
    pub fn verify_signature_update(
        &self,
        handle: SessionHandle,
        data: &[u8],
    ) -> Result<(), VerifyError> {
        let slot = self.sessions.get(handle)?;
        let failure = {
            let mut guard = slot.lock().map_err(|_| VerifyError::BadArgs)?;
            let session = guard.as_mut().ok_or(VerifyError::BadArgs)?;
            match session.update(data) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    audit::log_verification_failure(
                        session.correlation_id(),
                        "update",
                        e.kind(),
                        &e.to_string(),
                    );
                    e
                }
            }
        };
        // Failures are terminal; another thread may already have removed it.
        let _ = self.sessions.remove(handle);
        log::debug!("{} closed after update failure", handle);
        Err(failure)
    }

    /// Finish the digest and check digest and signature. The session is
    /// destroyed whatever the outcome.
    pub fn verify_signature_final(&self, handle: SessionHandle) -> Result<(), VerifyError> {
        let session = self.sessions.remove(handle)?;
        let correlation_id = session.correlation_id().to_string();
        let signer_subject = session.signer_subject().to_string();
        let signing_time = session.signing_time();
        let digest_algorithm = session.digest_algorithm();
        let bytes_hashed = session.bytes_hashed();

        match session.finish() {
            Ok(()) => {
                log::info!("{} verified ({} bytes)", handle, bytes_hashed);
                audit::log_verification_success(
                    &correlation_id,
                    &signer_subject,
                    &signing_time.to_string(),
                    digest_algorithm.name(),
                    bytes_hashed,
                );
                Ok(())
            }
            Err(e) => {
                log::info!("{} failed: {}", handle, e);
                audit::log_verification_failure(&correlation_id, "final", e.kind(), &e.to_string());
                Err(e)
            }
        }
    }

    /// Abandon a session without checking anything.
    pub fn verify_signature_abort(&self, handle: SessionHandle) -> Result<(), VerifyError> {
        let session = self.sessions.remove(handle)?;
        log::debug!("{} aborted", handle);
        audit::log_verification_abort(session.correlation_id(), session.bytes_hashed());
        Ok(())
    }

    /// Run a whole verification over `reader`, in [`READ_CHUNK_SIZE`] chunks.
    ///
    /// A read error aborts the session and is reported as `BadArgs`.
    pub fn verify_reader<R: Read>(
        &self,
        signature_pem: &[u8],
        root_ca_pem: &[u8],
        reference: Option<SigningTime>,
        mut reader: R,
    ) -> VerificationOutcome {
        let (handle, signing_time) =
            match self.verify_signature_init(signature_pem, root_ca_pem, reference) {
                Ok(opened) => opened,
                Err(e) => {
                    return VerificationOutcome {
                        signing_time: e.signing_time(),
                        result: Err(e),
                    }
                }
            };

        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("Read failed during verification: {}", e);
                    let _ = self.verify_signature_abort(handle);
                    return VerificationOutcome {
                        signing_time: Some(signing_time),
                        result: Err(VerifyError::BadArgs),
                    };
                }
            };
            if let Err(e) = self.verify_signature_update(handle, &buf[..n]) {
                return VerificationOutcome {
                    signing_time: Some(signing_time),
                    result: Err(e),
                };
            }
        }

        VerificationOutcome {
            signing_time: Some(signing_time),
            result: self.verify_signature_final(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedTimeSource;
    use std::sync::Arc;

    const HELLO: &[u8] = include_bytes!("../tests/data/hello.p7.pem");
    const ROOT_CA: &[u8] = include_bytes!("../tests/data/root-ca.pem");

    fn verifier() -> Verifier {
        Verifier::with_config(
            VerifierConfig::default()
                .with_time_source(Arc::new(FixedTimeSource::from_unix_secs(1_893_456_000))),
        )
    }

    #[test]
    fn test_session_lifecycle() {
        let verifier = verifier();
        let (handle, _) = verifier.verify_signature_init(HELLO, ROOT_CA, None).unwrap();
        assert_eq!(verifier.active_sessions(), 1);
        verifier.verify_signature_update(handle, b"hello world").unwrap();
        verifier.verify_signature_final(handle).unwrap();
        assert_eq!(verifier.active_sessions(), 0);

        assert!(matches!(
            verifier.verify_signature_update(handle, b"x"),
            Err(VerifyError::BadArgs)
        ));
        assert!(matches!(
            verifier.verify_signature_final(handle),
            Err(VerifyError::BadArgs)
        ));
    }

    #[test]
    fn test_update_failure_ends_session() {
        let verifier = verifier();
        let (handle, _) = verifier.verify_signature_init(HELLO, ROOT_CA, None).unwrap();
        assert!(matches!(
            verifier.verify_signature_update(handle, b""),
            Err(VerifyError::BadArgs)
        ));
        assert_eq!(verifier.active_sessions(), 0);
        assert!(matches!(
            verifier.verify_signature_final(handle),
            Err(VerifyError::BadArgs)
        ));
    }

    #[test]
    fn test_input_limits() {
        let verifier = Verifier::with_config(VerifierConfig::default().with_max_signature_pem_len(16));
        assert!(matches!(
            verifier.verify_signature_init(HELLO, ROOT_CA, None),
            Err(VerifyError::BadArgs)
        ));
        let verifier = Verifier::new();
        assert!(matches!(
            verifier.verify_signature_init(b"", ROOT_CA, None),
            Err(VerifyError::BadArgs)
        ));
        assert!(matches!(
            verifier.verify_signature_init(HELLO, b"", None),
            Err(VerifyError::BadArgs)
        ));
    }

    #[test]
    fn test_reader_read_error() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk on fire"))
            }
        }
        let verifier = verifier();
        let outcome = verifier.verify_reader(HELLO, ROOT_CA, None, Failing);
        assert!(matches!(outcome.result, Err(VerifyError::BadArgs)));
        assert!(outcome.signing_time.is_some());
        assert_eq!(verifier.active_sessions(), 0);
    }
}

//! Configuration for the verifier

use crate::time::{SystemTimeSource, TimeSource};
use std::fmt;
use std::sync::Arc;

/// Default cap on the size of a signature or root CA input (1 MiB).
pub const DEFAULT_MAX_INPUT_LEN: usize = 1024 * 1024;

/// Default number of sessions that may be open at once.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Configuration for a [`Verifier`](crate::Verifier)
#[derive(Clone)]
pub struct VerifierConfig {
    /// Clock used to check certificate validity periods during path
    /// validation. The rollback check never uses it.
    pub time_source: Arc<dyn TimeSource>,

    /// Offer the envelope's other certificates to the path builder as
    /// untrusted intermediates
    pub use_embedded_intermediates: bool,

    /// Largest accepted signature or root CA input, in bytes
    pub max_signature_pem_len: usize,

    /// Maximum number of simultaneously open sessions
    pub max_sessions: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            time_source: Arc::new(SystemTimeSource),
            use_embedded_intermediates: true,
            max_signature_pem_len: DEFAULT_MAX_INPUT_LEN,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("now_unix", &self.time_source.now_unix())
            .field("use_embedded_intermediates", &self.use_embedded_intermediates)
            .field("max_signature_pem_len", &self.max_signature_pem_len)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

impl VerifierConfig {
    /// Set the clock used for certificate validity
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Only accept signers issued directly by the root
    pub fn without_embedded_intermediates(mut self) -> Self {
        self.use_embedded_intermediates = false;
        self
    }

    /// Set the input size limit
    pub fn with_max_signature_pem_len(mut self, len: usize) -> Self {
        self.max_signature_pem_len = len;
        self
    }

    /// Set the session limit
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }
}

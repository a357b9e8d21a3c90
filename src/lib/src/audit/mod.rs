//! Audit logging for signature verification sessions.
//!
//! Every session gets a correlation ID at Init, and each audit event it
//! produces carries that ID, so the attempt, the rollback decision and the
//! final outcome of one signature can be joined in a log pipeline.
//!
//! # Usage
//!
//! ```rust,ignore
//! use p7verify::audit::{self, AuditConfig, LogDestination};
//!
//! // Initialize audit logging (typically once at program start)
//! audit::init(AuditConfig {
//!     destination: LogDestination::File("/var/log/p7verify.json".into()),
//!     ..AuditConfig::default()
//! })?;
//! ```
//!
//! Without [`init`] the events go to whatever `tracing` subscriber the host
//! application installed, or nowhere.
//!
//! # Event Types
//!
//! - `verification.attempt` - Init started
//! - `verification.rollback` - signing time older than the reference
//! - `verification.success` - Final accepted the signature
//! - `verification.failure` - any other failure, tagged with the stage
//! - `verification.abort` - session abandoned by the caller
//!
//! # JSON Output Example
//!
//! ```json
//! {
//!   "timestamp": "2026-10-18T20:00:00Z",
//!   "level": "INFO",
//!   "target": "p7verify::audit",
//!   "event_type": "verification.success",
//!   "correlation_id": "0b6f0c1e-4a8e-4c1f-9a53-5c4e0e7bb0a2",
//!   "signing_time": "2021-01-01T00:00:00Z",
//!   "bytes_hashed": 11
//! }
//! ```

use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    prelude::*,
    EnvFilter,
};

/// Target every audit event is emitted under.
pub const AUDIT_TARGET: &str = "p7verify::audit";

static AUDIT_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Audit log configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Enable audit logging (default: true)
    pub enabled: bool,
    /// Log destination
    pub destination: LogDestination,
    /// Use JSON format (default: true)
    pub json_format: bool,
    /// Log level filter (default: "p7verify::audit=info")
    pub filter: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            destination: LogDestination::Stderr,
            json_format: true,
            filter: format!("{AUDIT_TARGET}=info"),
        }
    }
}

/// Audit log destination
#[derive(Debug, Clone, Default)]
pub enum LogDestination {
    /// Write to stdout
    Stdout,
    /// Write to stderr (default)
    #[default]
    Stderr,
    /// Append to a file (path)
    File(String),
}

/// Initialize the audit logging subsystem.
///
/// Call once at startup; later calls are no-ops. Fails if the log file
/// cannot be opened or another global subscriber is already installed.
pub fn init(config: AuditConfig) -> std::io::Result<()> {
    if AUDIT_INITIALIZED.get().is_some() {
        return Ok(());
    }

    if !config.enabled {
        let _ = AUDIT_INITIALIZED.set(true);
        return Ok(());
    }

    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match &config.destination {
        LogDestination::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogDestination::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogDestination::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    };

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(FmtSpan::NONE)
                    .with_writer(writer),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(writer))
            .try_init()
    };
    result.map_err(|e| std::io::Error::other(e.to_string()))?;

    let _ = AUDIT_INITIALIZED.set(true);
    Ok(())
}

/// Generate a new correlation ID for tracking related audit events.
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Audit Event Functions
// ============================================================================

/// Log a verification attempt (Init entered).
pub fn log_verification_attempt(correlation_id: &str, root_subject: &str, reference: Option<&str>) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "verification.attempt",
        correlation_id = correlation_id,
        root_subject = root_subject,
        reference_time = reference.unwrap_or("n/a"),
        "Verification session initiated"
    );
}

/// Log a rejected, stale signature.
pub fn log_verification_rollback(correlation_id: &str, signing_time: &str, reference: &str) {
    tracing::warn!(
        target: AUDIT_TARGET,
        event_type = "verification.rollback",
        correlation_id = correlation_id,
        signing_time = signing_time,
        reference_time = reference,
        "Signing time is older than the reference time"
    );
}

/// Log a successful verification.
pub fn log_verification_success(
    correlation_id: &str,
    signer_subject: &str,
    signing_time: &str,
    digest_algorithm: &str,
    bytes_hashed: u64,
) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "verification.success",
        correlation_id = correlation_id,
        signer_subject = signer_subject,
        signing_time = signing_time,
        digest_algorithm = digest_algorithm,
        bytes_hashed = bytes_hashed,
        "Signature verified"
    );
}

/// Log a failed verification.
///
/// `stage` is the phase that failed: `init`, `update` or `final`.
pub fn log_verification_failure(
    correlation_id: &str,
    stage: &str,
    error_type: &str,
    error_message: &str,
) {
    let safe_message = sanitize_error_message(error_message);

    tracing::warn!(
        target: AUDIT_TARGET,
        event_type = "verification.failure",
        correlation_id = correlation_id,
        stage = stage,
        error_type = error_type,
        error_message = %safe_message,
        "Verification failed"
    );
}

/// Log a session abandoned through abort.
pub fn log_verification_abort(correlation_id: &str, bytes_hashed: u64) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "verification.abort",
        correlation_id = correlation_id,
        bytes_hashed = bytes_hashed,
        "Verification session aborted"
    );
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Keep audit records bounded and free of raw encoded blobs.
fn sanitize_error_message(message: &str) -> String {
    let sanitized = message
        .split_whitespace()
        .map(|word| {
            if word.len() > 64 && word.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
                "[BLOB]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if sanitized.chars().count() > 500 {
        let truncated: String = sanitized.chars().take(497).collect();
        format!("{truncated}...")
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_error_message() {
        assert_eq!(
            sanitize_error_message("CA verification failed: UnknownIssuer"),
            "CA verification failed: UnknownIssuer"
        );

        let with_blob = format!("bad attribute {}", "ab".repeat(40));
        assert_eq!(sanitize_error_message(&with_blob), "bad attribute [BLOB]");

        let long = "x ".repeat(400);
        let sanitized = sanitize_error_message(&long);
        assert_eq!(sanitized.chars().count(), 500);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn test_correlation_id_format() {
        let id = new_correlation_id();
        // UUID v4 format: 8-4-4-4-12
        assert_eq!(id.len(), 36);
        assert!(id.chars().filter(|c| *c == '-').count() == 4);
        assert_ne!(id, new_correlation_id());
    }

    #[test]
    fn test_disabled_init_is_noop() {
        let config = AuditConfig {
            enabled: false,
            ..AuditConfig::default()
        };
        init(config).unwrap();
        // Already marked initialized, so this does not install a subscriber.
        init(AuditConfig::default()).unwrap();
    }

    #[test]
    fn test_events_without_subscriber() {
        log_verification_attempt("id", "CN=Test Root CA", None);
        log_verification_rollback("id", "2021-01-01T00:00:00Z", "2022-01-01T00:00:00Z");
        log_verification_failure("id", "final", "digest_mismatch", "mismatch");
        log_verification_abort("id", 0);
    }
}

//! Clock abstraction for certificate validity checks
//!
//! Chain validation needs a "now" to check each certificate's validity period
//! against. Devices without a trustworthy wall clock (no RTC, no network time)
//! can plug in their own source, and tests pin the clock with
//! [`FixedTimeSource`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use p7verify::time::{FixedTimeSource, SystemTimeSource, TimeSource};
//!
//! let system = SystemTimeSource;
//! let now = system.now();
//!
//! let fixed = FixedTimeSource::from_unix_secs(1_609_459_200); // 2021-01-01 00:00:00 UTC
//! ```
//!
//! The signing-time rollback check never consults this clock: it compares the
//! signature's own claimed time against the caller's reference time.

use crate::signing_time::SigningTime;
use rustls_pki_types::UnixTime;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time source abstraction for pluggable time providers
pub trait TimeSource: Send + Sync {
    /// Get the current time from this source.
    fn now(&self) -> SystemTime;

    /// Get current time as Unix timestamp (seconds since epoch).
    fn now_unix(&self) -> u64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Current time in the form the path validator expects.
    fn validation_time(&self) -> UnixTime {
        UnixTime::since_unix_epoch(Duration::from_secs(self.now_unix()))
    }
}

/// System time source using `std::time::SystemTime`
///
/// This is the default. The system clock may be wrong if it is not synced,
/// in which case certificates can appear expired or not yet valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Fixed time source
///
/// Returns a predetermined timestamp, useful for:
/// - Unit testing with reproducible time
/// - Replaying a verification at a known point in time
/// - Validating the chain as of the signature's own signing time
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    timestamp: SystemTime,
}

impl FixedTimeSource {
    /// Create from a Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_secs(secs: u64) -> Self {
        Self {
            timestamp: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    /// Create from a calendar timestamp. Pre-1970 values clamp to the epoch.
    pub fn from_signing_time(time: SigningTime) -> Self {
        Self::from_unix_secs(time.unix_timestamp().unwrap_or(0))
    }

    /// Get the fixed timestamp.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> SystemTime {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source() {
        let source = SystemTimeSource;
        // 2024-01-01 00:00:00 UTC
        assert!(source.now_unix() > 1_704_067_200);
    }

    #[test]
    fn test_fixed_time_source() {
        let source = FixedTimeSource::from_unix_secs(1_609_459_200);
        assert_eq!(source.now_unix(), 1_609_459_200);
        assert_eq!(source.now(), source.timestamp());
        assert_eq!(
            source.validation_time().as_secs(),
            1_609_459_200
        );
    }

    #[test]
    fn test_fixed_from_signing_time() {
        let time = SigningTime::new(2021, 1, 1, 0, 0, 0).unwrap();
        let source = FixedTimeSource::from_signing_time(time);
        assert_eq!(source.now_unix(), 1_609_459_200);

        let ancient = SigningTime::new(1960, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(FixedTimeSource::from_signing_time(ancient).now_unix(), 0);
    }

    #[test]
    fn test_time_source_is_object_safe() {
        let sources: Vec<Box<dyn TimeSource>> = vec![
            Box::new(SystemTimeSource),
            Box::new(FixedTimeSource::from_unix_secs(42)),
        ];
        assert_eq!(sources[1].now_unix(), 42);
    }
}

//! Fuzz target for signing-time parsing
//!
//! Covers the UTCTime and GeneralizedTime parsers and the reference format.
//!
//! Security concerns:
//! - Out-of-bounds reads on short or truncated inputs
//! - Arithmetic overflow in field conversion
//! - Accepting impossible calendar values

#![no_main]

use libfuzzer_sys::fuzz_target;
use p7verify::SigningTime;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    for parsed in [
        SigningTime::from_utc_time(s),
        SigningTime::from_generalized_time(s),
        SigningTime::parse_reference(s),
    ]
    .into_iter()
    .flatten()
    {
        // Anything accepted must be a real calendar time
        assert!(parsed.to_naive().is_some());

        let rendered = parsed.to_reference_string();
        assert_eq!(SigningTime::parse_reference(&rendered), Ok(parsed));
    }
});

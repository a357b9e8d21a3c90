//! Fuzz target for PKCS#7 envelope parsing
//!
//! Drives the signed-data decoder and the attribute accessors the verifier
//! uses during Init and Final.
//!
//! Security concerns:
//! - Panics on malformed or truncated DER
//! - Oversized length fields
//! - Attribute sets with missing, repeated or mistyped values

#![no_main]

use libfuzzer_sys::fuzz_target;
use p7verify::SignedEnvelope;

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = SignedEnvelope::from_der(data) else {
        return;
    };
    let Ok(signer) = envelope.signer_info() else {
        return;
    };

    if let Some(index) = envelope.find_signer_certificate(signer) {
        let _ = envelope.certificate_der(index);
    }
    let _ = envelope.signed_attrs_der(signer);
    let _ = envelope.signing_time(signer);
    let _ = envelope.message_digest(signer);
});

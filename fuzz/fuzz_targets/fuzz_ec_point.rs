//! Fuzz target for EC public key reconstruction
//!
//! The first byte selects the curve, the rest is the point encoding.
//!
//! Security concerns:
//! - Accepting points that are not on the curve
//! - Length confusion between curves

#![no_main]

use libfuzzer_sys::fuzz_target;
use p7verify::{EcPublicKey, NamedCurve, SignerKey};

fuzz_target!(|data: &[u8]| {
    let Some((&selector, point)) = data.split_first() else {
        return;
    };
    let curve = if selector & 1 == 0 {
        NamedCurve::P256
    } else {
        NamedCurve::P384
    };

    if let Ok(key) = EcPublicKey::from_uncompressed_point(point, &curve.oid()) {
        assert_eq!(key.curve(), curve);
        assert_eq!(key.to_uncompressed_point(), point);
    }

    let _ = SignerKey::from_spki_der(data);
});

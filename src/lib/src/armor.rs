//! PEM armour handling for envelopes and certificates.

/// Labels OpenSSL and other tools use for PKCS#7 / CMS blocks.
pub const PKCS7_LABELS: &[&str] = &["PKCS7", "CMS", "PKCS #7 SIGNED DATA"];

/// Labels accepted for X.509 certificates.
pub const CERTIFICATE_LABELS: &[&str] = &["CERTIFICATE", "X509 CERTIFICATE"];

const DER_SEQUENCE: u8 = 0x30;

/// Strip PEM armour from `input`, requiring one of `labels`.
///
/// Input that already starts with a DER SEQUENCE is returned unchanged.
pub fn decode(input: &[u8], labels: &[&str]) -> Result<Vec<u8>, String> {
    if input.first() == Some(&DER_SEQUENCE) {
        return Ok(input.to_vec());
    }
    let block = pem::parse(input).map_err(|e| format!("PEM decoding failed: {e}"))?;
    if !labels.contains(&block.tag()) {
        return Err(format!("unexpected PEM label \"{}\"", block.tag()));
    }
    if block.contents().is_empty() {
        return Err("empty PEM block".to_string());
    }
    Ok(block.into_contents())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_labels() {
        let root = include_bytes!("../tests/data/root-ca.pem");
        let der = decode(root, CERTIFICATE_LABELS).unwrap();
        assert_eq!(der[0], DER_SEQUENCE);

        let err = decode(root, PKCS7_LABELS).unwrap_err();
        assert!(err.contains("CERTIFICATE"));
    }

    #[test]
    fn test_der_passthrough() {
        let root = include_bytes!("../tests/data/root-ca.pem");
        let der = decode(root, CERTIFICATE_LABELS).unwrap();
        assert_eq!(decode(&der, CERTIFICATE_LABELS).unwrap(), der);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode(b"", PKCS7_LABELS).is_err());
        assert!(decode(b"hello world", PKCS7_LABELS).is_err());
        let empty = b"-----BEGIN PKCS7-----\n-----END PKCS7-----\n";
        assert!(decode(empty, PKCS7_LABELS).is_err());
    }
}

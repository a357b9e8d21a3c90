use crate::error::KeyError;

/// Fill a fresh buffer of `len` bytes from the operating system RNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, KeyError> {
    let mut buf = vec![0u8; len];
    if len > 0 {
        getrandom::getrandom(&mut buf).map_err(|e| KeyError::Random(e.to_string()))?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        assert!(random_bytes(0).unwrap().is_empty());

        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}

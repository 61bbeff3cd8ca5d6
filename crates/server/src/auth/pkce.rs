//! PKCE challenge computation.
//!
//! The challenge is the standard (padded) base64 encoding of the SHA-256 or
//! SHA-512 digest of the verifier.

use crate::error::ApiError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256, Sha512};

pub const S256: &str = "S256";
pub const S512: &str = "S512";

pub fn challenge(code: &str, method: &str) -> Result<String, ApiError> {
    match method {
        S256 => Ok(STANDARD.encode(Sha256::digest(code.as_bytes()))),
        S512 => Ok(STANDARD.encode(Sha512::digest(code.as_bytes()))),
        other => Err(ApiError::InvalidMethod(other.to_string())),
    }
}

/// Recomputes the challenge for `code_verifier` and compares it to the stored one.
pub fn verify(code_verifier: &str, method: &str, stored_challenge: &str) -> Result<bool, ApiError> {
    Ok(challenge(code_verifier, method)? == stored_challenge)
}

pub fn is_supported(method: &str) -> bool {
    matches!(method, S256 | S512)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_matches_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            challenge("abc", S256).unwrap(),
            "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0="
        );
    }

    #[test]
    fn s512_uses_padded_standard_base64() {
        let c = challenge("abc", S512).unwrap();
        assert_eq!(c.len(), 88);
        assert!(c.ends_with("=="));
    }

    #[test]
    fn round_trip_accepts_same_code_only() {
        for code in ["", "a", "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk", "ünïcødé"] {
            for method in [S256, S512] {
                let stored = challenge(code, method).unwrap();
                assert!(verify(code, method, &stored).unwrap());
                assert!(!verify(&format!("{code}x"), method, &stored).unwrap());
            }
        }
    }

    #[test]
    fn methods_do_not_cross_verify() {
        let stored = challenge("verifier", S256).unwrap();
        assert!(!verify("verifier", S512, &stored).unwrap());
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(matches!(
            challenge("abc", "plain"),
            Err(ApiError::InvalidMethod(m)) if m == "plain"
        ));
        assert!(!is_supported("S384"));
    }
}

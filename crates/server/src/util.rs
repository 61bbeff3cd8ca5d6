//! Small helpers shared by the services: random identifiers and field checks.

use crate::error::ApiError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Random URL-safe string of exactly `len` characters.
pub fn generate_random_string(len: usize) -> String {
    // base64 yields 4 chars per 3 bytes
    let mut bytes = vec![0u8; len.div_ceil(4) * 3];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut encoded = URL_SAFE_NO_PAD.encode(bytes);
    encoded.truncate(len);
    encoded
}

pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Required, trimmed-non-empty string no longer than `max` characters.
pub fn require(field: &str, value: Option<&str>, max: usize) -> Result<String, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => {
            check_length(field, v, max)?;
            Ok(v.to_string())
        }
        _ => Err(ApiError::missing(field)),
    }
}

pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::length(field, max));
    }
    Ok(())
}

/// Email addresses follow RFC 5322 and are capped at 100 characters.
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    check_length("EmailAddress", email, 100)?;
    email
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|e| ApiError::InvalidEmail(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_strings_have_requested_length() {
        for len in [1, 12, 31, 32, 64] {
            let s = generate_random_string(len);
            assert_eq!(s.len(), len);
            assert!(
                s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
        assert_ne!(generate_random_string(32), generate_random_string(32));
    }

    #[test]
    fn require_trims_and_bounds() {
        assert_eq!(require("Name", Some("  App "), 10).unwrap(), "App");
        assert!(matches!(
            require("Name", Some("   "), 10),
            Err(ApiError::MissingParam(_))
        ));
        assert!(matches!(
            require("Name", None, 10),
            Err(ApiError::MissingParam(_))
        ));
        assert!(matches!(
            require("Name", Some("abcdefghijk"), 10),
            Err(ApiError::InvalidLength { max: 10, .. })
        ));
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("someone@example.com").is_ok());
        assert!(matches!(
            validate_email("not-an-email"),
            Err(ApiError::InvalidEmail(_))
        ));
        let long = format!("{}@example.com", "a".repeat(95));
        assert!(matches!(
            validate_email(&long),
            Err(ApiError::InvalidLength { .. })
        ));
    }
}

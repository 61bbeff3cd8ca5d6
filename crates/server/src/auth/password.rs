//! Password hashing and the password policy.
//!
//! Hashing uses bcrypt at the configured cost. Both hashing and verification
//! run on the blocking pool so they never stall the async executor.

use crate::error::ApiError;
use tokio::task::spawn_blocking;

/// bcrypt ignores everything past 72 bytes, so longer passwords are refused.
pub const MAX_PASSWORD_LEN: usize = 72;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, ApiError> {
        let password = password.to_owned();
        let cost = self.cost;
        spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing task failed");
                ApiError::general("unable to hash password")
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "bcrypt hash failed");
                ApiError::general("unable to hash password")
            })
    }

    /// `false` for a mismatch, an empty stored hash, or a malformed hash.
    pub async fn verify(&self, password: &str, hash: &str) -> bool {
        if hash.is_empty() {
            return false;
        }
        let password = password.to_owned();
        let hash = hash.to_owned();
        spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

/// At least 8 characters, one uppercase letter, one digit and one
/// punctuation or symbol character. `pwd` must equal `confirm`.
pub fn validate_password(pwd: &str, confirm: &str) -> Result<(), ApiError> {
    if pwd != confirm {
        return Err(ApiError::PasswordValidation(
            "passwords do not match".into(),
        ));
    }
    if pwd.len() > MAX_PASSWORD_LEN {
        return Err(ApiError::length("Pwd", MAX_PASSWORD_LEN));
    }

    let has_number = pwd.chars().any(char::is_numeric);
    let has_upper = pwd.chars().any(char::is_uppercase);
    let has_special = pwd
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    let mut problems = Vec::new();
    if pwd.chars().count() < MIN_PASSWORD_LEN {
        problems.push("must be at least 8 characters long");
    }
    if !has_upper {
        problems.push("must have one uppercase letter");
    }
    if !has_number {
        problems.push("must have one number");
    }
    if !has_special {
        problems.push("must have one special character [@$!%*?]");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ApiError::PasswordValidation(problems.join(", ")))
    }
}

//! Account credential hashing and the password policy
//!
//! Hashes are argon2id in PHC string format, salt embedded, one salt per
//! account. A hash that fails to produce or parse points at the server or
//! the user store, never at the caller, so those paths surface as internal
//! errors rather than authentication failures.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::AppError;

/// Minimum accepted password length for account registration
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Registration-time password policy
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    if password.trim().is_empty() {
        return Err(AppError::Validation(
            "Password must not be only whitespace".into(),
        ));
    }
    Ok(())
}

/// Hash an account password with a fresh salt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Database(format!("Password hashing failed: {e}")))
}

/// Check a login attempt against the stored hash.
///
/// A mismatch is `Ok(false)`; an unparseable stored hash means the user
/// record is corrupt and is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Database(format!("Stored password hash is invalid: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_roundtrip() {
        let hash = hash_password("dispute-portal-2024").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("dispute-portal-2024", &hash).unwrap());
        assert!(!verify_password("dispute-portal-2025", &hash).unwrap());
    }

    #[test]
    fn test_each_account_gets_its_own_salt() {
        let first = hash_password("shared-password").unwrap();
        let second = hash_password("shared-password").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("shared-password", &second).unwrap());
    }

    #[test]
    fn test_corrupt_stored_hash_is_internal_error() {
        let result = verify_password("anything", "plaintext-left-by-a-bad-migration");
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_strength("mediation!").is_ok());
        assert!(matches!(
            validate_password_strength("short"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_password_strength("        "),
            Err(AppError::Validation(_))
        ));
    }
}

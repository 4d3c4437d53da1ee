//! Password policy enforcement and verification using Argon2id.

use argon2::{Argon2, PasswordVerifier};

use crate::error::AuthError;

/// Check a candidate password against the policy: minimum length plus
/// at least one digit, one symbol, one uppercase, and one lowercase
/// character. Returns the list of unmet requirements.
pub fn check_policy(password: &str, min_length: usize) -> Result<(), AuthError> {
    let mut missing = Vec::new();
    if password.chars().count() < min_length {
        missing.push(format!("at least {min_length} characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        missing.push("an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        missing.push("a lowercase letter".to_string());
    }
    if !password
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace())
    {
        missing.push("a symbol".to_string());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(missing.join(", ")))
    }
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// If `pepper` is provided it is prepended to the password before
/// verification — this must match the pepper used during hashing.
/// Argon2 verification does not short-circuit on the candidate
/// password.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::PasswordHasher;
    use argon2::password_hash::SaltString;
    use argon2::password_hash::rand_core::OsRng;

    /// Helper: hash a password with optional pepper using Argon2id.
    fn hash_password(password: &str, pepper: Option<&str>) -> String {
        let peppered: String;
        let input = match pepper {
            Some(p) => {
                peppered = format!("{p}{password}");
                peppered.as_bytes()
            }
            None => password.as_bytes(),
        };
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(input, &salt)
            .expect("hashing failed")
            .to_string()
    }

    #[test]
    fn policy_accepts_strong_password() {
        assert!(check_policy("Str0ng!Passw0rd", 12).is_ok());
    }

    #[test]
    fn policy_rejects_short_password() {
        let err = check_policy("Sh0rt!", 12).unwrap_err();
        assert!(err.to_string().contains("12 characters"));
    }

    #[test]
    fn policy_reports_all_missing_classes() {
        let err = check_policy("alllowercaseletters", 12).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("digit"));
        assert!(msg.contains("uppercase"));
        assert!(msg.contains("symbol"));
    }

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("Hunter2!Hunter2", None);
        assert!(verify_password("Hunter2!Hunter2", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("Hunter2!Hunter2", None);
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("Hunter2!Hunter2", Some("pepper!"));
        assert!(verify_password("Hunter2!Hunter2", &hash, Some("pepper!")).unwrap());
        // Without pepper should fail.
        assert!(!verify_password("Hunter2!Hunter2", &hash, None).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        let result = verify_password("pw", "not-a-hash", None);
        assert!(result.is_err());
    }
}

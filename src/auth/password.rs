//! Password hashing and verification using Argon2
//!
//! Stored passwords are argon2id PHC strings; plaintext never reaches the
//! store.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::{AgroError, Result};

const MIN_LENGTH: usize = 8;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AgroError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AgroError::Auth(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// At least eight characters with an uppercase letter, a lowercase letter
/// and a digit
pub fn check_password_strength(password: &str) -> Result<()> {
    let strong = password.chars().count() >= MIN_LENGTH
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit());

    if strong {
        Ok(())
    } else {
        Err(AgroError::Validation(format!(
            "La contraseña debe tener al menos {} caracteres e incluir mayúsculas, minúsculas y números.",
            MIN_LENGTH
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "Cosecha2024";
        let hash = hash_password(password).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("cosecha2024", &hash).unwrap());
    }

    #[test]
    fn test_different_salts() {
        let hash1 = hash_password("Misma1clave").unwrap();
        let hash2 = hash_password("Misma1clave").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("password", "texto-plano").is_err());
    }

    #[test]
    fn test_strength_rules() {
        assert!(check_password_strength("Riego2024").is_ok());
        assert!(check_password_strength("Rie1").is_err());
        assert!(check_password_strength("riego2024").is_err());
        assert!(check_password_strength("RIEGO2024").is_err());
        assert!(check_password_strength("RiegoRiego").is_err());
    }
}

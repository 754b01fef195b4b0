use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::ServiceError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// PHC-formatted argon2id hash with a fresh salt
pub fn hash_password(plain: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// False for a wrong password and for a malformed stored hash alike.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn check_password_strength(plain: &str) -> Result<(), ServiceError> {
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::ValidationError(format!(
            "La contraseña debe tener al menos {} caracteres",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("galletas-2024").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("galletas-2024", &hash));
        assert!(!verify_password("galletas-2025", &hash));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "pbkdf2_sha256$legacy"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_password_strength("corta").is_err());
        assert!(check_password_strength("suficiente").is_ok());
    }
}

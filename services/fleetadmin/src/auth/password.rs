//! Password hashing with Argon2id.
//!
//! The generated salt is returned next to the PHC string so it can be stored
//! in its own column; verification only needs the PHC string, which embeds it.
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

pub fn hash_password(password: &str) -> Result<HashedPassword, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| PasswordError::Hash(err.to_string()))?
        .to_string();
    Ok(HashedPassword {
        hash,
        salt: salt.as_str().to_string(),
    })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = argon2::PasswordHash::new(hash)
        .map_err(|err| PasswordError::Malformed(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(PasswordError::Malformed(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hashed = hash_password("hunter22").expect("hash");
        assert!(verify_password("hunter22", &hashed.hash).expect("verify"));
        assert!(hashed.hash.contains(&hashed.salt));
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hashed = hash_password("hunter22").expect("hash");
        assert!(!verify_password("wrong-password", &hashed.hash).expect("verify"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password").expect("a");
        let b = hash_password("same-password").expect("b");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash").is_err());
    }
}

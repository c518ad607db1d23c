//! Argon2 helpers for password fields stored hashed at rest.

use std::sync::Arc;

use {
    argon2::Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::{
    error::{Error, Result},
    file_db::PasswordComparator,
};

/// Hash `password` into a PHC string suitable for a password-file field.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::message(format!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Check `password` against a PHC string. Unparseable hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Comparator for [`FilePasswordDb`](crate::file_db::FilePasswordDb) files
/// whose password field holds argon2 PHC strings.
pub fn argon2_comparator() -> PasswordComparator {
    Arc::new(|_username: &str, supplied: &str, stored: &str| {
        verify_password(supplied, stored)
    })
}

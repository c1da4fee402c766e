// src/auth/password.rs
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const SALT_BYTES: usize = 16;

/// Salted SHA-256 of a password. Returns (hash, salt); both go in the user
/// row, the password itself is never stored.
pub fn hash_password(password: &str) -> (Vec<u8>, Vec<u8>) {
    let mut salt = vec![0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    (hash_with_salt(password, &salt), salt)
}

pub fn hash_with_salt(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Constant-time-ish compare (simple and sufficient here).
pub fn verify_password(password: &str, salt: &[u8], stored_hash: &[u8]) -> bool {
    let candidate = hash_with_salt(password, salt);
    if candidate.len() != stored_hash.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in candidate.iter().zip(stored_hash.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

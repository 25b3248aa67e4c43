use sha2::{Digest, Sha256};

/// Pseudonymise an email: lowercase hex SHA-256 of its UTF-8 bytes.
pub fn hash_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hex::encode(hasher.finalize())
}

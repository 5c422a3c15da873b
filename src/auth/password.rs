use crate::error::AppError;

const HASH_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// bcrypt hash of a password or security PIN.
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(secret, HASH_COST)?)
}

/// A hash that fails to parse never verifies.
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    match bcrypt::verify(secret, hash) {
        Ok(valid) => valid,
        Err(err) => {
            tracing::warn!(error = %err, "Stored hash could not be verified");
            false
        }
    }
}

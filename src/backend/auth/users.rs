/**
 * Password Hashing
 *
 * bcrypt hashing and verification for account passwords. Hashes are only
 * ever read on the login path through `UserRecord`.
 */
use bcrypt::BcryptError;

/// Hash a password with the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check `password` against a stored bcrypt hash.
///
/// An unparsable hash counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match bcrypt::verify(password, password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::error!("[Auth] Password verification error: {:?}", e);
            false
        }
    }
}

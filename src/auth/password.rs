/// Password Hashing and Verification
///
/// The auth engine only sees the [`PasswordHasher`] trait; [`BcryptHasher`]
/// is the production implementation.

use crate::error::AppError;

/// bcrypt only looks at the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AppError>;
    fn verify(&self, hash: &str, password: &str) -> Result<bool, AppError>;
}

#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    /// # Errors
    /// Fails for inputs longer than 72 bytes instead of silently truncating
    fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Password(format!(
                "password exceeds {} bytes",
                MAX_PASSWORD_BYTES
            )));
        }

        bcrypt::hash(password, self.cost).map_err(|e| AppError::Password(e.to_string()))
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, AppError> {
        bcrypt::verify(password, hash).map_err(|e| AppError::Password(e.to_string()))
    }
}

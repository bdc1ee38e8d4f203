/// Refresh Token Generation
///
/// Refresh tokens are opaque strings built from OS randomness and encoded
/// as unpadded URL-safe base64. The database backend never stores them in
/// plaintext, only their SHA-256 digest (see [`hash_token`]).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AppError, TokenError};

/// Draw `byte_length` bytes from the OS entropy source and encode them
///
/// # Errors
/// - `TokenError::InvalidLength` when `byte_length` is zero
/// - `TokenError::RandomSource` when the entropy source fails
pub fn generate_refresh_token(byte_length: usize) -> Result<String, AppError> {
    if byte_length == 0 {
        return Err(AppError::Token(TokenError::InvalidLength(byte_length)));
    }

    let mut bytes = vec![0u8; byte_length];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        tracing::error!(error = %e, "Entropy source failed");
        AppError::Token(TokenError::RandomSource(e.to_string()))
    })?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a refresh token using SHA-256 for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

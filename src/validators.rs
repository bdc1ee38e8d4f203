/// Request field validators
///
/// Applied by the HTTP handlers before anything reaches the auth engine.
/// Failures surface as `InvalidInput` (400).

use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::MAX_PASSWORD_BYTES;
use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 3;
const MAX_LOCAL_PART_LENGTH: usize = 64;
pub const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates an email address and returns it trimmed and lowercased
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    let local_part_len = trimmed.find('@').unwrap_or(0);
    if local_part_len > MAX_LOCAL_PART_LENGTH {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates password length. Content rules are left to the user.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    // bcrypt limit, counted in bytes
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_BYTES,
        ));
    }

    Ok(())
}

/// Authentication module
///
/// Access token codec, refresh token generation, password hashing and the
/// auth engine that ties them to the stores.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::AccessTokenClaims;
pub use jwt::issue_access_token;
pub use jwt::verify_access_token;
pub use password::{BcryptHasher, PasswordHasher, MAX_PASSWORD_BYTES};
pub use refresh_token::generate_refresh_token;
pub use refresh_token::hash_token;
pub use service::{AuthService, RotationOutcome};

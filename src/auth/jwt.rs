/// Access token codec
///
/// Mints and verifies HS256-signed access tokens. Verification tells a
/// correctly signed but expired token (`TokenExpired`) apart from anything
/// forged, malformed or signed with another algorithm (`InvalidToken`).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::AccessTokenClaims;
use crate::error::{AppError, AuthError, TokenError};
use crate::models::User;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Sign a new access token for `user` that expires `ttl` from now
///
/// # Errors
/// Returns `TokenError::Signing` if encoding fails
pub fn issue_access_token(
    user: &User,
    ttl: chrono::Duration,
    secret: &str,
) -> Result<String, AppError> {
    let claims = AccessTokenClaims::new(user, ttl);

    encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Token(TokenError::Signing(e.to_string())))
}

/// Verify signature and algorithm of `token`, then its expiry
///
/// # Errors
/// - `TokenExpired` when the signature is valid but `exp` is not in the future
/// - `InvalidToken` for every other failure
pub fn verify_access_token(token: &str, secret: &str) -> Result<AccessTokenClaims, AppError> {
    let mut validation = Validation::new(ALGORITHM);
    // Expiry is checked below, after the signature, with no leeway.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let claims = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AppError::Auth(AuthError::InvalidToken)
    })?;

    if claims.is_expired() {
        return Err(AppError::Auth(AuthError::TokenExpired));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Duration;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    fn user(role: Role) -> User {
        let now = chrono::Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_verify_token() {
        for (role, ttl) in [(Role::User, 1), (Role::Admin, 15), (Role::User, 60 * 24)] {
            let user = user(role);
            let token = issue_access_token(&user, Duration::minutes(ttl), SECRET)
                .expect("Failed to issue token");
            let claims = verify_access_token(&token, SECRET).expect("Failed to verify token");

            assert_eq!(claims.sub, user.id.to_string());
            assert_eq!(claims.role, user.role);
        }
    }

    #[test]
    fn test_non_positive_ttl_is_expired_not_invalid() {
        for minutes in [0, -1, -60] {
            let token = issue_access_token(&user(Role::User), Duration::minutes(minutes), SECRET)
                .expect("Failed to issue token");
            let result = verify_access_token(&token, SECRET);

            assert!(
                matches!(result, Err(AppError::Auth(AuthError::TokenExpired))),
                "ttl {} minutes should be reported as expired",
                minutes
            );
        }
    }

    #[test]
    fn test_garbage_token() {
        let result = verify_access_token("invalid.token.here", SECRET);
        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }

    #[test]
    fn test_tampered_token() {
        let token = issue_access_token(&user(Role::User), Duration::minutes(5), SECRET)
            .expect("Failed to issue token");

        let tampered = format!("{}X", token);
        let result = verify_access_token(&tampered, SECRET);

        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }

    #[test]
    fn test_wrong_secret() {
        let token = issue_access_token(&user(Role::User), Duration::minutes(5), SECRET)
            .expect("Failed to issue token");
        let result = verify_access_token(&token, "another-secret");

        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }

    #[test]
    fn test_expired_token_with_wrong_secret_is_invalid() {
        let token = issue_access_token(&user(Role::User), Duration::minutes(-1), SECRET)
            .expect("Failed to issue token");
        let result = verify_access_token(&token, "another-secret");

        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let claims = AccessTokenClaims::new(&user(Role::Admin), Duration::minutes(5));
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.", header, payload);

        let result = verify_access_token(&forged, SECRET);
        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }

    #[test]
    fn test_other_hmac_algorithm_is_rejected() {
        let claims = AccessTokenClaims::new(&user(Role::User), Duration::minutes(5));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let result = verify_access_token(&token, SECRET);
        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }
}

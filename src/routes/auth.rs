/// Authentication Routes
///
/// Registration, login, explicit refresh, logout and the current user's
/// profile. All token logic lives in [`AuthService`]; handlers only validate
/// input and shape responses.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::AuthService;
use crate::error::{AppError, AuthError};
use crate::middleware::{AuthenticatedUser, RefreshCookie, REFRESH_COOKIE_NAME};
use crate::models::TokenPair;
use crate::validators::{is_valid_email, is_valid_password};

/// Registration and login request
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Body fallback for clients that cannot send the refresh cookie
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair response
#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: TokenPair, auth: &AuthService) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: auth.settings().access_token_ttl().num_seconds(),
        }
    }
}

/// Refresh token from the cookie, falling back to the JSON body
fn presented_refresh_token(
    req: &HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
) -> Option<String> {
    req.cookie(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .or_else(|| body.map(|b| b.into_inner().refresh_token))
        .filter(|t| !t.is_empty())
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or password length
/// - 409: email already registered
pub async fn register(
    form: web::Json<CredentialsRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let user = auth.register(&email, &form.password).await?;

    Ok(HttpResponse::Created().json(user))
}

/// POST /auth/login
///
/// Returns the token pair in the body and sets the refresh token cookie.
///
/// # Errors
/// - 400: malformed email
/// - 401: unknown email or wrong password (indistinguishable)
pub async fn login(
    form: web::Json<CredentialsRequest>,
    auth: web::Data<AuthService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    let pair = auth.login(&email, &form.password).await?;
    let refresh_cookie = cookie.build(&pair.refresh_token);

    Ok(HttpResponse::Ok()
        .cookie(refresh_cookie)
        .json(AuthResponse::new(pair, &auth)))
}

/// POST /auth/refresh
///
/// Exchanges the refresh token for a new access token. The refresh token is
/// rotated according to the configured policy; a rotated token replaces the
/// cookie.
///
/// # Errors
/// - 401: missing, unknown or expired refresh token
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    auth: web::Data<AuthService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    let refresh_token =
        presented_refresh_token(&req, body).ok_or(AppError::Auth(AuthError::MissingToken))?;

    let (pair, rotated) = auth.refresh(&refresh_token).await.map_err(|e| {
        if e.is_unauthorized() {
            AppError::Auth(AuthError::Unauthorized)
        } else {
            e
        }
    })?;

    let mut response = HttpResponse::Ok();
    if rotated {
        response.cookie(cookie.build(&pair.refresh_token));
    }

    Ok(response.json(AuthResponse::new(pair, &auth)))
}

/// POST /auth/logout
///
/// Deletes the refresh token and clears the cookie. Succeeds even when the
/// token is unknown or absent. Access tokens already issued stay valid until
/// they expire.
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    auth: web::Data<AuthService>,
    cookie: web::Data<RefreshCookie>,
) -> Result<HttpResponse, AppError> {
    if let Some(refresh_token) = presented_refresh_token(&req, body) {
        auth.logout(&refresh_token).await?;
    }

    Ok(HttpResponse::NoContent().cookie(cookie.removal()).finish())
}

/// GET /api/profile
///
/// Requires the re-authentication middleware on the enclosing scope.
pub async fn profile(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user.into_profile())
}

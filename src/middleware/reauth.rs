/// Re-authentication Middleware
///
/// Validates the bearer access token on every request of the wrapped scope.
/// When the token is correctly signed but expired, the refresh token cookie is
/// exchanged for a new access token in the same round trip: the handler runs
/// as the resolved user, the new access token is returned in the
/// `Authorization` response header, and a rotated refresh token (if any) is
/// set as a new cookie.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderValue, AUTHORIZATION},
    Error, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::{AppError, AuthError};
use crate::middleware::cookie::{RefreshCookie, REFRESH_COOKIE_NAME};
use crate::middleware::identity::{AuthenticatedUser, RequestContext};
use crate::models::User;

const BEARER_PREFIX: &str = "Bearer ";

/// Credentials minted while serving an expired access token
struct Reissued {
    access_token: String,
    rotated_refresh_token: Option<String>,
}

struct Authenticated {
    user: User,
    reissued: Option<Reissued>,
}

pub struct ReauthMiddleware {
    auth: Arc<AuthService>,
    cookie: RefreshCookie,
}

impl ReauthMiddleware {
    pub fn new(auth: Arc<AuthService>, cookie: RefreshCookie) -> Self {
        Self { auth, cookie }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ReauthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ReauthMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ReauthMiddlewareService {
            service: Rc::new(service),
            auth: self.auth.clone(),
            cookie: self.cookie.clone(),
        }))
    }
}

pub struct ReauthMiddlewareService<S> {
    service: Rc<S>,
    auth: Arc<AuthService>,
    cookie: RefreshCookie,
}

impl<S, B> Service<ServiceRequest> for ReauthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let auth = self.auth.clone();
        let cookie = self.cookie.clone();

        Box::pin(async move {
            let authenticated = match authenticate(&req, &auth).await {
                Ok(authenticated) => authenticated,
                Err(e) => {
                    let (request, _) = req.into_parts();
                    let response = HttpResponse::from_error(e).map_into_right_body();
                    return Ok(ServiceResponse::new(request, response));
                }
            };

            tracing::debug!(
                user_id = %authenticated.user.id,
                refreshed = authenticated.reissued.is_some(),
                "Request authenticated"
            );
            RequestContext::authenticated(AuthenticatedUser::new(authenticated.user.profile()))
                .attach(&req);

            let mut res = service.call(req).await?;

            if let Some(reissued) = authenticated.reissued {
                let bearer = HeaderValue::from_str(&format!(
                    "{}{}",
                    BEARER_PREFIX, reissued.access_token
                ))
                .map_err(|e| AppError::Internal(e.to_string()))?;
                res.headers_mut().insert(AUTHORIZATION, bearer);

                if let Some(refresh_token) = reissued.rotated_refresh_token {
                    res.response_mut()
                        .add_cookie(&cookie.build(&refresh_token))
                        .map_err(|e| AppError::Internal(e.to_string()))?;
                }
            }

            Ok(res.map_into_left_body())
        })
    }
}

/// Extract the bearer token. `Err(MissingToken)` when there is no header,
/// `Err(Unauthorized)` when it is not a well-formed bearer credential.
fn bearer_token(req: &ServiceRequest) -> Result<String, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Auth(AuthError::Unauthorized))?;

    Ok(token.to_string())
}

async fn authenticate(req: &ServiceRequest, auth: &AuthService) -> Result<Authenticated, AppError> {
    let token = bearer_token(req).map_err(|e| {
        tracing::warn!(error = %e, "Missing or malformed Authorization header");
        e
    })?;

    match auth
        .verify_access_token(&token, &auth.settings().access_secret)
        .await
    {
        Ok(user) => Ok(Authenticated {
            user,
            reissued: None,
        }),
        Err(e) if e.is_token_expired() => refresh(req, auth).await,
        Err(e) if e.is_unauthorized() => {
            tracing::warn!(error = %e, "Access token rejected");
            Err(AppError::Auth(AuthError::Unauthorized))
        }
        Err(e) => Err(e),
    }
}

/// Exchange the refresh cookie for a new access token
async fn refresh(req: &ServiceRequest, auth: &AuthService) -> Result<Authenticated, AppError> {
    let refresh_token = req
        .cookie(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            tracing::warn!("Access token expired and no refresh token presented");
            AppError::Auth(AuthError::Unauthorized)
        })?;

    let (record, user) = auth
        .exchange_refresh(&refresh_token)
        .await
        .map_err(|e| {
            if e.is_unauthorized() {
                tracing::warn!(error = %e, "Refresh token rejected");
                AppError::Auth(AuthError::Unauthorized)
            } else {
                e
            }
        })?;

    let outcome = auth.rotate_if_expired(&record, user.id).await?;
    let access_token = auth.issue_access_token(&user)?;

    tracing::info!(
        user_id = %user.id,
        rotated = outcome.is_rotated(),
        "Expired access token re-issued"
    );

    Ok(Authenticated {
        reissued: Some(Reissued {
            access_token,
            rotated_refresh_token: outcome.is_rotated().then(|| outcome.token().to_string()),
        }),
        user,
    })
}

/// Request-scoped identity
///
/// The re-authentication middleware stores a [`RequestContext`] in the request
/// extensions; handlers read it back through the extractors below.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::models::{Role, UserProfile};

/// The user a request was authenticated as
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    profile: UserProfile,
}

impl AuthenticatedUser {
    pub fn new(profile: UserProfile) -> Self {
        Self { profile }
    }

    pub fn id(&self) -> Uuid {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn into_profile(self) -> UserProfile {
        self.profile
    }
}

/// Per-request context. `authenticated_user` is only ever set by the
/// re-authentication middleware.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub authenticated_user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn authenticated(user: AuthenticatedUser) -> Self {
        Self {
            authenticated_user: Some(user),
        }
    }

    /// Store `self` in the request extensions, replacing any earlier context
    pub fn attach(self, req: &impl HttpMessage) {
        req.extensions_mut().insert(self);
    }

    pub fn of(req: &impl HttpMessage) -> Self {
        req.extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default()
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.authenticated_user.as_ref()
    }
}

impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(RequestContext::of(req)))
    }
}

/// Extracts the authenticated user; rejects with 401 outside protected scopes
impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            RequestContext::of(req)
                .authenticated_user
                .ok_or(AppError::Auth(AuthError::Unauthorized)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::Utc;

    fn profile() -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_web::test]
    async fn test_extracts_attached_user() {
        let req = TestRequest::default().to_http_request();
        let user = AuthenticatedUser::new(profile());
        RequestContext::authenticated(user.clone()).attach(&req);

        let extracted = AuthenticatedUser::extract(&req).await.unwrap();
        assert_eq!(extracted, user);
        assert_eq!(RequestContext::of(&req).user(), Some(&user));
    }

    #[actix_web::test]
    async fn test_missing_user_is_unauthorized() {
        let req = TestRequest::default().to_http_request();

        let result = AuthenticatedUser::extract(&req).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::Unauthorized))));
        assert!(RequestContext::extract(&req).await.unwrap().user().is_none());
    }
}

/// Refresh token cookie
///
/// The refresh token travels as an HTTP-only cookie; the access token as a
/// bearer credential.

use actix_web::cookie::{time, Cookie, SameSite};

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Debug, Clone)]
pub struct RefreshCookie {
    secure: bool,
    max_age: chrono::Duration,
}

impl RefreshCookie {
    pub fn new(secure: bool, max_age: chrono::Duration) -> Self {
        Self { secure, max_age }
    }

    /// Cookie carrying `token`
    pub fn build(&self, token: &str) -> Cookie<'static> {
        Cookie::build(REFRESH_COOKIE_NAME, token.to_string())
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.max_age.num_seconds()))
            .finish()
    }

    /// Cookie that makes the client drop the refresh token
    pub fn removal(&self) -> Cookie<'static> {
        let mut cookie = self.build("");
        cookie.make_removal();
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = RefreshCookie::new(true, chrono::Duration::days(7)).build("abc");

        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn test_removal_cookie_is_empty_and_expired() {
        let cookie = RefreshCookie::new(false, chrono::Duration::days(7)).removal();

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}

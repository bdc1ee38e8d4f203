/// Middleware module
///
/// Re-authentication of protected routes and the request identity it
/// attaches.

mod cookie;
mod identity;
mod reauth;

pub use cookie::{RefreshCookie, REFRESH_COOKIE_NAME};
pub use identity::{AuthenticatedUser, RequestContext};
pub use reauth::ReauthMiddleware;

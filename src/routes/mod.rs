mod auth;
mod health_check;

pub use auth::{login, logout, profile, refresh, register, AuthResponse};
pub use health_check::health_check;

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reauth::auth::{AuthService, BcryptHasher};
use reauth::configuration::{JwtSettings, RotationPolicy};
use reauth::middleware::RefreshCookie;
use reauth::startup::run;
use reauth::storage::InMemoryStorage;

pub const SECRET: &str = "test-secret-key-at-least-32-characters-long";

pub fn jwt_settings(rotation: RotationPolicy) -> JwtSettings {
    JwtSettings {
        access_secret: SECRET.to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_days: 7,
        refresh_token_length: 32,
        rotation,
        rotation_window_hours: 24,
    }
}

pub fn auth_service(store: Arc<InMemoryStorage>, rotation: RotationPolicy) -> Arc<AuthService> {
    Arc::new(AuthService::new(
        store.clone(),
        store,
        Arc::new(BcryptHasher::new(4)),
        jwt_settings(rotation),
        Duration::from_secs(2),
    ))
}

pub fn refresh_cookie() -> RefreshCookie {
    RefreshCookie::new(false, chrono::Duration::days(7))
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStorage>,
    pub auth: Arc<AuthService>,
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStorage::new());
    let auth = auth_service(store.clone(), RotationPolicy::OnExpiry);
    let server = run(listener, auth.clone(), refresh_cookie(), 1).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        auth,
    }
}

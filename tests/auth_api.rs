//! HTTP-level tests of registration, login, refresh, logout and the
//! protected profile route.

mod common;

use common::{spawn_app, TestApp, SECRET};
use reauth::auth::issue_access_token;
use reauth::routes::AuthResponse;
use reauth::storage::UserRepository;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{Client, Response};
use serde_json::{json, Value};

async fn post_json(app: &TestApp, path: &str, body: &Value) -> Response {
    Client::new()
        .post(&format!("{}{}", app.address, path))
        .json(body)
        .send()
        .await
        .expect("Failed to execute request.")
}

async fn register(app: &TestApp, email: &str, password: &str) -> Response {
    post_json(app, "/auth/register", &json!({"email": email, "password": password})).await
}

async fn login(app: &TestApp, email: &str, password: &str) -> Response {
    post_json(app, "/auth/login", &json!({"email": email, "password": password})).await
}

fn refresh_cookie_value(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("refresh_token="))
        .map(|v| {
            v.trim_start_matches("refresh_token=")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

#[tokio::test]
async fn register_returns_201_without_password_hash() {
    let app = spawn_app();

    let response = register(&app, "a@x.com", "password123").await;
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["role"], "user");
    assert!(body.get("id").is_some());
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email() {
    let app = spawn_app();

    assert_eq!(201, register(&app, "a@x.com", "password123").await.status().as_u16());
    let response = register(&app, "a@x.com", "password456").await;
    assert_eq!(409, response.status().as_u16());

    let stored = app.store.find_by_email("a@x.com").await.unwrap();
    assert!(bcrypt::verify("password123", &stored.password_hash).unwrap());
}

#[tokio::test]
async fn register_returns_400_for_invalid_input() {
    let app = spawn_app();

    let cases = vec![
        (json!({"email": "notanemail", "password": "password123"}), "invalid email"),
        (json!({"email": "a@x.com", "password": "short"}), "short password"),
        (json!({"email": "a@x.com", "password": "a".repeat(73)}), "long password"),
        (json!({"email": "a@x.com"}), "missing password"),
        (json!({}), "missing all fields"),
    ];

    for (body, reason) in cases {
        let response = post_json(&app, "/auth/register", &body).await;
        assert_eq!(400, response.status().as_u16(), "Should reject: {}", reason);
    }
}

#[tokio::test]
async fn login_returns_token_pair_and_cookie() {
    let app = spawn_app();
    register(&app, "a@x.com", "password123").await;

    let response = login(&app, "a@x.com", "password123").await;
    assert_eq!(200, response.status().as_u16());

    let cookie = refresh_cookie_value(&response).expect("refresh cookie not set");
    let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));

    let body: AuthResponse = response.json().await.unwrap();
    assert_eq!(body.token_type, "Bearer");
    assert_eq!(body.expires_in, 15 * 60);
    assert_eq!(body.refresh_token, cookie);

    let user = app.auth.verify_access_token(&body.access_token, SECRET).await.unwrap();
    assert_eq!(user.email, "a@x.com");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app();
    register(&app, "a@x.com", "password123").await;

    let wrong_password = login(&app, "a@x.com", "password124").await;
    let unknown_email = login(&app, "b@x.com", "password123").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a["code"], b["code"]);
    assert_eq!(a["message"], b["message"]);
}

#[tokio::test]
async fn profile_requires_valid_access_token() {
    let app = spawn_app();
    register(&app, "a@x.com", "password123").await;
    let pair: AuthResponse = login(&app, "a@x.com", "password123").await.json().await.unwrap();
    let client = Client::new();

    let ok = client
        .get(&format!("{}/api/profile", app.address))
        .header(AUTHORIZATION, format!("Bearer {}", pair.access_token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, ok.status().as_u16());
    assert!(ok.headers().get(AUTHORIZATION).is_none());
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["email"], "a@x.com");

    let missing = client
        .get(&format!("{}/api/profile", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(401, missing.status().as_u16());
}

#[tokio::test]
async fn profile_transparently_refreshes_expired_access_token() {
    let app = spawn_app();
    register(&app, "a@x.com", "password123").await;
    let pair: AuthResponse = login(&app, "a@x.com", "password123").await.json().await.unwrap();

    let user = app.store.find_by_email("a@x.com").await.unwrap();
    let expired = issue_access_token(&user, chrono::Duration::minutes(-1), SECRET).unwrap();

    let response = Client::new()
        .get(&format!("{}/api/profile", app.address))
        .header(AUTHORIZATION, format!("Bearer {}", expired))
        .header(COOKIE, format!("refresh_token={}", pair.refresh_token))
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
    // The stored refresh token is a week from expiry, so it is kept
    assert!(refresh_cookie_value(&response).is_none());

    let new_access = response
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .expect("new access token header")
        .to_string();
    let refreshed = app.auth.verify_access_token(&new_access, SECRET).await.unwrap();
    assert_eq!(refreshed.id, user.id);
}

#[tokio::test]
async fn refresh_endpoint_issues_new_access_token() {
    let app = spawn_app();
    register(&app, "a@x.com", "password123").await;
    let pair: AuthResponse = login(&app, "a@x.com", "password123").await.json().await.unwrap();

    let response = Client::new()
        .post(&format!("{}/auth/refresh", app.address))
        .header(COOKIE, format!("refresh_token={}", pair.refresh_token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let body: AuthResponse = response.json().await.unwrap();
    assert_eq!(body.refresh_token, pair.refresh_token);
    assert!(app.auth.verify_access_token(&body.access_token, SECRET).await.is_ok());

    let from_body = post_json(&app, "/auth/refresh", &json!({"refresh_token": pair.refresh_token})).await;
    assert_eq!(200, from_body.status().as_u16());

    let unknown = post_json(&app, "/auth/refresh", &json!({"refresh_token": "nope"})).await;
    assert_eq!(401, unknown.status().as_u16());
}

#[tokio::test]
async fn logout_revokes_refresh_token_and_is_idempotent() {
    let app = spawn_app();
    register(&app, "a@x.com", "password123").await;
    let pair: AuthResponse = login(&app, "a@x.com", "password123").await.json().await.unwrap();
    let client = Client::new();

    for _ in 0..2 {
        let response = client
            .post(&format!("{}/auth/logout", app.address))
            .header(COOKIE, format!("refresh_token={}", pair.refresh_token))
            .send()
            .await
            .unwrap();
        assert_eq!(204, response.status().as_u16());
        assert_eq!(Some(String::new()), refresh_cookie_value(&response));
    }

    let refreshed = client
        .post(&format!("{}/auth/refresh", app.address))
        .header(COOKIE, format!("refresh_token={}", pair.refresh_token))
        .send()
        .await
        .unwrap();
    assert_eq!(401, refreshed.status().as_u16());

    // No token blacklist: the access token keeps working until it expires
    let profile = client
        .get(&format!("{}/api/profile", app.address))
        .header(AUTHORIZATION, format!("Bearer {}", pair.access_token))
        .send()
        .await
        .unwrap();
    assert_eq!(200, profile.status().as_u16());
}

//! Login, cookie sessions and guarded page navigation through the full router.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use youthmh::config::{Config, ConfigSource};
use youthmh::identity::hash_password;
use youthmh::server::{router, AppState};
use youthmh::store::MemoryStore;

fn state() -> AppState {
    let nested = json!({
        "auth": { "users": [
            { "username": "staff", "password_hash": hash_password("s3cret").unwrap(), "role": "admin" },
            { "username": "student", "password_hash": hash_password("hunter2").unwrap() }
        ]}
    });
    let config = Config::from_source(&ConfigSource::new(HashMap::new(), nested)).unwrap();
    AppState::with_backends(config, Arc::new(MemoryStore::new()), None, None)
}

async fn send(state: &AppState, req: Request<Body>) -> Response {
    router(state.clone()).oneshot(req).await.unwrap()
}

async fn get(state: &AppState, uri: &str, cookie: Option<&str>) -> Response {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    send(state, b.body(Body::empty()).unwrap()).await
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(resp: &Response) -> &str {
    resp.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

/// Log in and return the `name=value` cookie pair.
async fn login(state: &AppState, username: &str, password: &str) -> String {
    let req = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "username": username, "password": password }).to_string()))
        .unwrap();
    let resp = send(state, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn anonymous_admin_visit_goes_to_sign_in_with_return_path() {
    let st = state();
    let resp = get(&st, "/admin", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/FireLogin?redirect=%2Fadmin");
}

#[tokio::test]
async fn public_pages_proceed_and_unknown_pages_404() {
    let st = state();
    let resp = get(&st, "/BooksTable?page=2", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "route": "BooksTable", "view": "BooksTableView" }));

    let resp = get(&st, "/nowhere", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_session_reaches_admin_page() {
    let st = state();
    let cookie = login(&st, "staff", "s3cret").await;
    let resp = get(&st, "/admin", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["route"], "Admin");

    let info = body_json(get(&st, "/session", Some(&cookie)).await).await;
    assert_eq!(info, json!({ "authenticated": true, "user_id": "staff", "role": "admin" }));
}

#[tokio::test]
async fn wrong_role_is_sent_home() {
    let st = state();
    let cookie = login(&st, "student", "hunter2").await;
    let resp = get(&st, "/admin", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let st = state();
    let cookie = login(&st, "staff", "s3cret").await;
    let req = Request::builder().method("POST").uri("/logout").header(header::COOKIE, &cookie).body(Body::empty()).unwrap();
    let resp = send(&st, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = get(&st, "/admin", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).starts_with("/FireLogin?redirect="));

    let info = body_json(get(&st, "/session", Some(&cookie)).await).await;
    assert_eq!(info["authenticated"], false);
    assert_eq!(info["role"], "user");
}

#[tokio::test]
async fn bad_credentials_are_a_401() {
    let st = state();
    let req = Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "username": "staff", "password": "nope" }).to_string()))
        .unwrap();
    let resp = send(&st, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
}

//! Cookie sessions and page navigation through the route guard.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::{AuthError, LoginRequest, SessionContext};
use crate::routing::Navigation;

use super::handlers::parse_body;
use super::AppState;

pub const SESSION_COOKIE: &str = "youthmh_session";

pub(crate) fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn cookie_attrs(secure: bool) -> &'static str {
    if secure { "HttpOnly; Secure; SameSite=Strict; Path=/" } else { "HttpOnly; SameSite=Strict; Path=/" }
}

/// Browsers drop `Secure` cookies over plain HTTP unless the host is localhost.
fn set_session_cookie(token: &str, max_age_secs: u64, secure: bool) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; Max-Age={}; {}", SESSION_COOKIE, token, max_age_secs, cookie_attrs(secure))).ok()
}

fn clear_session_cookie(secure: bool) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; {}", SESSION_COOKIE, cookie_attrs(secure))).ok()
}

/// The caller's live session, or a resolved anonymous one.
pub(crate) fn session_for(state: &AppState, headers: &HeaderMap) -> SessionContext {
    parse_cookie(headers, SESSION_COOKIE)
        .and_then(|token| state.sessions.validate(&token))
        .unwrap_or_else(SessionContext::anonymous)
}

#[derive(Debug, Default, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Response> {
    let payload: LoginPayload = parse_body(&body)?;
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::user("missing_credentials", "Missing username/password"));
    }
    let ip = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string());
    let req = LoginRequest { username: payload.username, password: payload.password, ip };

    let outcome = match state.auth.login(&req) {
        Ok(o) => o,
        Err(AuthError::InvalidCredentials) => {
            info!(target: "session", user = %req.username, "login rejected");
            return Err(AppError::auth("invalid_credentials", "Invalid credentials"));
        }
        Err(e) => {
            error!(target: "session", "login error: {e}");
            return Err(AppError::internal("login_failed", "Login failed"));
        }
    };

    let role = outcome.role.clone();
    let session = state.sessions.issue(outcome.principal, &role);
    info!(target: "session", user = %session.user_id, role = %role, "login");

    let mut h = HeaderMap::new();
    if let Some(cookie) = set_session_cookie(&session.token, state.config.session_ttl_secs, state.config.cookie_secure) {
        h.insert(header::SET_COOKIE, cookie);
    }
    Ok((StatusCode::OK, h, Json(json!({ "status": "ok", "user_id": session.user_id, "role": role }))).into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        if state.sessions.logout(&token) {
            info!(target: "session", "logout");
        }
    }
    let mut h = HeaderMap::new();
    if let Some(cookie) = clear_session_cookie(state.config.cookie_secure) {
        h.insert(header::SET_COOKIE, cookie);
    }
    (StatusCode::OK, h, Json(json!({ "status": "ok" })))
}

pub async fn session_info(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = session_for(&state, &headers);
    let principal = ctx.auth.current_principal().await;
    Json(json!({
        "authenticated": principal.is_some(),
        "user_id": principal.map(|p| p.user_id),
        "role": ctx.roles.get_role(),
    }))
}

/// Any unrouted GET is a page navigation checked by the route guard.
pub async fn navigate(method: Method, uri: Uri, State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if method != Method::GET {
        return Err(AppError::not_found("not_found", "Not Found"));
    }
    let full_path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let ctx = session_for(&state, &headers).with_request_id(Uuid::new_v4().to_string());
    match state.guard.check(&ctx, full_path).await {
        Navigation::Proceed { route, view } => Ok(Json(json!({ "route": route, "view": view })).into_response()),
        Navigation::Redirect { to, .. } => {
            let location = HeaderValue::from_str(&to).map_err(|_| AppError::internal("bad_redirect", "Internal error"))?;
            Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
        }
        Navigation::NotFound => Err(AppError::not_found("not_found", "Not Found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_cookie_among_others() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; youthmh_session=abc=; lang=en"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc="));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn session_cookie_is_locked_down() {
        let v = set_session_cookie("tok", 3600, true).unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("youthmh_session=tok;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Secure"));
        assert!(s.contains("SameSite=Strict"));
        assert!(s.contains("Max-Age=3600"));
    }

    #[test]
    fn plain_http_cookie_drops_only_secure() {
        let s = set_session_cookie("tok", 60, false).unwrap().to_str().unwrap().to_string();
        assert!(!s.contains("Secure"));
        assert!(s.contains("HttpOnly; SameSite=Strict"));
        let cleared = clear_session_cookie(false).unwrap().to_str().unwrap().to_string();
        assert!(cleared.starts_with("youthmh_session=deleted;"));
        assert!(!cleared.contains("Secure"));
    }
}

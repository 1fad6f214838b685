use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::auth("auth", "no").http_status(), 401);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::method_not_allowed().http_status(), 405);
    assert_eq!(AppError::config("smtp_not_configured", "SMTP not configured").http_status(), 500);
    assert_eq!(AppError::backend("store", "down").http_status(), 500);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn config_and_input_errors_are_distinct() {
    assert!(AppError::config("missing_key", "Missing SENDGRID_API_KEY").is_server_side());
    assert!(!AppError::user("no_recipients", "No recipients").is_server_side());
}

#[test]
fn response_carries_status_and_plain_reason() {
    let resp = AppError::user("no_recipients", "No recipients").into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = AppError::method_not_allowed().into_response();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn anyhow_errors_become_generic_internal() {
    let err: AppError = anyhow::anyhow!("secret detail").into();
    assert_eq!(err.http_status(), 500);
    assert_eq!(err.message(), "Internal error");
}

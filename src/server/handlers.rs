//! Stateless dispatch endpoints. Each one checks method and input before it touches the
//! document store or a mail provider; missing credentials answer 500, caller mistakes 400.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::mail::{BulkMail, MailAttachment, MailError, OutboundMail};
use crate::store::{CREATED_AT_FIELD, RECENT_LIMIT};

use super::AppState;

/// Parse a JSON body; an empty body reads as `{}`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> AppResult<T> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!(target: "dispatch", "malformed payload: {e}");
        AppError::user("malformed_payload", "Malformed payload")
    })
}

pub async fn count_books(method: Method, State(state): State<AppState>) -> AppResult<Json<Value>> {
    if method != Method::GET {
        return Err(AppError::method_not_allowed());
    }
    count_collection(&state, "countBooks").await
}

pub async fn count_resources(State(state): State<AppState>) -> AppResult<Json<Value>> {
    count_collection(&state, "resourcesCount").await
}

async fn count_collection(state: &AppState, endpoint: &str) -> AppResult<Json<Value>> {
    let request_id = Uuid::new_v4();
    let collection = &state.config.firestore.collection;
    match state.store.count(collection).await {
        Ok(count) => {
            info!(target: "dispatch", %request_id, endpoint, collection = %collection, count, "counted documents");
            Ok(Json(json!({ "count": count })))
        }
        Err(e) => {
            error!(target: "dispatch", %request_id, endpoint, "Error counting books: {e}");
            Err(AppError::backend("count_failed", "Error counting books"))
        }
    }
}

pub async fn list_resources(State(state): State<AppState>) -> AppResult<Json<Vec<Value>>> {
    let request_id = Uuid::new_v4();
    let collection = &state.config.firestore.collection;
    let docs = state.store.list_recent(collection, CREATED_AT_FIELD, RECENT_LIMIT).await.map_err(|e| {
        error!(target: "dispatch", %request_id, "listing resources failed: {e}");
        AppError::backend("list_failed", "Error listing resources")
    })?;
    Ok(Json(docs.iter().map(|d| d.to_json()).collect()))
}

#[derive(Debug, Default, Deserialize)]
struct AttachmentPayload {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct SendMailPayload {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    attachments: Option<Vec<AttachmentPayload>>,
}

fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn decode_attachments(list: Option<Vec<AttachmentPayload>>) -> AppResult<Vec<MailAttachment>> {
    let engine = base64::engine::general_purpose::STANDARD;
    list.unwrap_or_default()
        .into_iter()
        .map(|a| {
            let content = engine
                .decode(a.content.trim())
                .map_err(|_| AppError::user("bad_attachment", "Invalid attachment content"))?;
            let filename = if a.filename.trim().is_empty() { "attachment".to_string() } else { a.filename };
            Ok(MailAttachment { filename, content })
        })
        .collect()
}

pub async fn send_mail(method: Method, State(state): State<AppState>, body: Bytes) -> AppResult<impl IntoResponse> {
    if method != Method::POST {
        return Err(AppError::method_not_allowed());
    }
    let request_id = Uuid::new_v4();
    let payload: SendMailPayload = parse_body(&body)?;

    let subject = present(payload.subject);
    let text = present(payload.text);
    let html = present(payload.html);
    let Some(subject) = subject.filter(|_| text.is_some() || html.is_some()) else {
        return Err(AppError::user("missing_fields", "Missing subject/text"));
    };
    let attachments = decode_attachments(payload.attachments)?;

    let smtp_cfg = &state.config.smtp;
    let (Some(mailer), Some(from)) = (state.smtp.as_ref(), smtp_cfg.user.as_ref()) else {
        error!(
            target: "dispatch",
            %request_id,
            host = %smtp_cfg.host,
            has_user = smtp_cfg.user.is_some(),
            has_pass = smtp_cfg.pass.is_some(),
            "SMTP not configured"
        );
        return Err(AppError::config("smtp_not_configured", "SMTP not configured"));
    };

    let caller_to = payload.to.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let from_caller = caller_to.is_some();
    let to = caller_to.unwrap_or_else(|| state.config.mail.to_default.clone());
    if to.is_empty() {
        error!(target: "dispatch", %request_id, "no recipient given and MAIL_TO_DEFAULT is unset");
        return Err(AppError::config("no_default_recipient", "No recipient configured"));
    }

    let prefix = state.config.mail.subject_prefix.as_str();
    let mail = OutboundMail {
        from: from.clone(),
        to: to.clone(),
        subject: if prefix.is_empty() { subject } else { format!("{prefix} {subject}") },
        text,
        html,
        attachments,
    };

    match mailer.send(mail).await {
        Ok(()) => {
            info!(target: "dispatch", %request_id, "sendMail delivered");
            Ok((StatusCode::OK, "OK"))
        }
        Err(MailError::Address { address, reason }) if address == to && from_caller => {
            warn!(target: "dispatch", %request_id, "rejected recipient: {reason}");
            Err(AppError::user("bad_recipient", "Invalid recipient"))
        }
        Err(MailError::Address { address, reason }) if address == to => {
            error!(target: "dispatch", %request_id, has_default_recipient = true, "MAIL_TO_DEFAULT is not a valid address: {reason}");
            Err(AppError::config("bad_default_recipient", "Invalid default recipient"))
        }
        Err(e) => {
            error!(target: "dispatch", %request_id, "[sendMail] error: {e}");
            Err(AppError::backend("send_failed", "Failed to send"))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct BulkPayload {
    #[serde(default)]
    recipients: Value,
    #[serde(default)]
    subject: Value,
    #[serde(default)]
    body: Value,
}

/// Scalars and structures are rendered as text; absent or `null` is empty.
fn text_of(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn recipient_list(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|r| r.as_str())
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub async fn send_bulk_email(State(state): State<AppState>, body: Bytes) -> AppResult<Json<Value>> {
    let request_id = Uuid::new_v4();
    let payload: BulkPayload = parse_body(&body)?;

    let recipients = recipient_list(&payload.recipients);
    if recipients.is_empty() {
        return Err(AppError::user("no_recipients", "No recipients"));
    }
    let Some(bulk) = state.bulk.as_ref() else {
        error!(target: "dispatch", %request_id, has_api_key = false, "bulk mail not configured");
        return Err(AppError::config("missing_api_key", "Missing SENDGRID_API_KEY"));
    };

    let mail = BulkMail::from_body(&state.config.mail.bulk_from, recipients, &text_of(&payload.subject), &text_of(&payload.body));
    match bulk.send_each(mail).await {
        Ok(sent) => {
            info!(target: "dispatch", %request_id, sent, "sendBulkEmail delivered");
            Ok(Json(json!({ "ok": true, "sent": sent })))
        }
        Err(e) => {
            error!(target: "dispatch", %request_id, "[sendBulkEmail] error: {e}");
            Err(AppError::backend("send_failed", "Failed to send"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_reads_as_defaults() {
        let p: SendMailPayload = parse_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(p.subject.is_none());
    }

    #[test]
    fn malformed_json_is_a_400() {
        let err = parse_body::<BulkPayload>(&Bytes::from_static(b"{nope")).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn recipients_must_be_an_array_of_addresses() {
        assert!(recipient_list(&json!("a@x.org")).is_empty());
        assert!(recipient_list(&Value::Null).is_empty());
        assert_eq!(recipient_list(&json!(["a@x.org", " ", 3, " b@x.org "])), vec!["a@x.org", "b@x.org"]);
    }

    #[test]
    fn bulk_subject_and_body_accept_any_json_value() {
        let p: BulkPayload = parse_body(&Bytes::from_static(br#"{"recipients":["a@x.org"],"subject":7,"body":null}"#)).unwrap();
        assert_eq!(text_of(&p.subject), "7");
        assert_eq!(text_of(&p.body), "");
        assert_eq!(text_of(&json!(true)), "true");
        assert_eq!(text_of(&json!("<b>")), "<b>");
    }

    #[test]
    fn attachments_decode_from_base64() {
        let list = vec![AttachmentPayload { filename: "".into(), content: "aGVsbG8=".into() }];
        let out = decode_attachments(Some(list)).unwrap();
        assert_eq!(out[0].filename, "attachment");
        assert_eq!(out[0].content, b"hello");

        let bad = vec![AttachmentPayload { filename: "x".into(), content: "***".into() }];
        assert_eq!(decode_attachments(Some(bad)).unwrap_err().http_status(), 400);
    }
}

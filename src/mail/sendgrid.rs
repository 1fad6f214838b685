use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{BulkMail, BulkMailer, MailError};

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
/// Upper bound on personalizations in one v3 request.
pub const MAX_PERSONALIZATIONS: usize = 1000;

/// SendGrid v3 client. Each recipient gets its own personalization, so nobody sees the
/// other addresses.
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SendGridMailer {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key, endpoint: SENDGRID_ENDPOINT.to_string() }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

/// Request bodies for one bulk send, split at [`MAX_PERSONALIZATIONS`].
pub(crate) fn payloads(mail: &BulkMail) -> Vec<Value> {
    mail.recipients
        .chunks(MAX_PERSONALIZATIONS)
        .map(|chunk| {
            let personalizations: Vec<Value> = chunk.iter().map(|r| json!({ "to": [{ "email": r }] })).collect();
            json!({
                "personalizations": personalizations,
                "from": { "email": mail.from },
                "subject": mail.subject,
                "content": [
                    { "type": "text/plain", "value": mail.text },
                    { "type": "text/html", "value": mail.html }
                ]
            })
        })
        .collect()
}

#[async_trait]
impl BulkMailer for SendGridMailer {
    async fn send_each(&self, mail: BulkMail) -> Result<usize, MailError> {
        for body in payloads(&mail) {
            let resp = self.client.post(&self.endpoint).bearer_auth(&self.api_key).json(&body).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(MailError::Provider { status: status.as_u16(), body });
            }
        }
        info!(target: "mail", recipients = mail.recipients.len(), "bulk mail accepted by provider");
        Ok(mail.recipients.len())
    }
}

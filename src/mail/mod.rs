//! Outbound mail: one message over SMTP, or one message per recipient through SendGrid.
//! Handlers talk to the [`Mailer`] and [`BulkMailer`] traits so delivery can be swapped out.

mod sendgrid;
mod smtp;

use async_trait::async_trait;
use thiserror::Error;

pub use sendgrid::{SendGridMailer, SENDGRID_ENDPOINT, MAX_PERSONALIZATIONS};
pub use smtp::{SmtpMailer, build_message};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("smtp transport error: {0}")]
    Transport(String),

    #[error("mail provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail provider returned {status}: {body}")]
    Provider { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// A single fully-resolved message (prefix applied, recipient chosen, attachments decoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<MailAttachment>,
}

/// The same message delivered separately to each recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkMail {
    pub from: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl BulkMail {
    /// Plain part is the body as written; the HTML part shows it escaped inside `<pre>`.
    pub fn from_body(from: &str, recipients: Vec<String>, subject: &str, body: &str) -> Self {
        Self {
            from: from.to_string(),
            recipients,
            subject: subject.to_string(),
            text: body.to_string(),
            html: preformatted_html(body),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError>;
}

#[async_trait]
pub trait BulkMailer: Send + Sync {
    /// Returns the number of recipients the provider accepted.
    async fn send_each(&self, mail: BulkMail) -> Result<usize, MailError>;
}

/// Escape `<`, `>` and `&`.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn preformatted_html(body: &str) -> String {
    format!("<pre>{}</pre>", escape_html(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_once() {
        assert_eq!(escape_html("<script>alert('x')</script>"), "&lt;script&gt;alert('x')&lt;/script&gt;");
        assert_eq!(escape_html("a & b &lt;"), "a &amp; b &amp;lt;");
        assert_eq!(escape_html("plain \"text\""), "plain \"text\"");
    }

    #[test]
    fn bulk_mail_keeps_raw_text_and_escaped_html() {
        let m = BulkMail::from_body("no-reply@youth-mh.example", vec!["a@example.com".into()], "Hello", "line1\n<b>bold</b>");
        assert_eq!(m.text, "line1\n<b>bold</b>");
        assert_eq!(m.html, "<pre>line1\n&lt;b&gt;bold&lt;/b&gt;</pre>");
    }
}

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpSettings;

use super::{MailError, Mailer, OutboundMail};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Port 465 wraps the connection in TLS; other ports must upgrade with STARTTLS.
    pub fn from_settings(s: &SmtpSettings) -> Result<Self, MailError> {
        let params = TlsParameters::new(s.host.clone()).map_err(|e| MailError::Transport(e.to_string()))?;
        let tls = if s.implicit_tls() { Tls::Wrapper(params) } else { Tls::Required(params) };
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(s.host.as_str())
            .port(s.port)
            .tls(tls);
        if let (Some(user), Some(pass)) = (&s.user, &s.pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self { transport: builder.build() })
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|e| MailError::Address { address: address.to_string(), reason: e.to_string() })
}

/// Build the MIME message: text and/or HTML body, then any attachments.
pub fn build_message(mail: &OutboundMail) -> Result<Message, MailError> {
    let body = match (&mail.text, &mail.html) {
        (Some(t), Some(h)) => MultiPart::alternative_plain_html(t.clone(), h.clone()),
        (Some(t), None) => MultiPart::mixed().singlepart(SinglePart::plain(t.clone())),
        (None, Some(h)) => MultiPart::mixed().singlepart(SinglePart::html(h.clone())),
        (None, None) => return Err(MailError::Build("message has neither text nor html".into())),
    };
    let mut root = MultiPart::mixed().multipart(body);
    for a in mail.attachments.iter() {
        let ct = ContentType::parse("application/octet-stream").map_err(|e| MailError::Build(e.to_string()))?;
        root = root.singlepart(Attachment::new(a.filename.clone()).body(a.content.clone(), ct));
    }
    Message::builder()
        .from(mailbox(&mail.from)?)
        .to(mailbox(&mail.to)?)
        .subject(mail.subject.clone())
        .multipart(root)
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutboundMail) -> Result<(), MailError> {
        let message = build_message(&mail)?;
        let resp = self.transport.send(message).await.map_err(|e| MailError::Transport(e.to_string()))?;
        info!(target: "mail", code = %resp.code(), attachments = mail.attachments.len(), "smtp message accepted");
        Ok(())
    }
}

//! Outgoing mail.
//!
//! Everything that sends mail goes through [`MailTransport`]; the SMTP
//! implementation is built on lettre. Sends are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::SmtpConfig;
use crate::error::{ReportError, ReportResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    pub fn text(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: EmailMessage) -> ReportResult<()>;
}

pub type DynMailer = Arc<dyn MailTransport>;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    reply_to: Option<Mailbox>,
}

impl SmtpMailer {
    /// Authenticated TLS relay when credentials are configured, otherwise a
    /// plain connection to a local relay.
    pub fn new(config: &SmtpConfig) -> ReportResult<Self> {
        let transport = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| ReportError::Mail(format!("Failed to create SMTP transport: {}", e)))?
                .port(config.port)
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build(),
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build(),
        };

        let from = parse_mailbox(&format!("{} <{}>", config.from_name, config.from_email))?;
        let reply_to = config.reply_to.as_deref().map(parse_mailbox).transpose()?;

        Ok(Self {
            transport,
            from,
            reply_to,
        })
    }

    fn build(&self, message: EmailMessage) -> ReportResult<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&message.to)?)
            .subject(&message.subject);

        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let email = if message.attachments.is_empty() {
            builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body)
        } else {
            let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(message.body));
            for attachment in message.attachments {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    ReportError::Mail(format!(
                        "Invalid content type {}: {}",
                        attachment.content_type, e
                    ))
                })?;
                parts = parts.singlepart(
                    MimeAttachment::new(attachment.file_name).body(attachment.content, content_type),
                );
            }
            builder.multipart(parts)
        };

        email.map_err(|e| ReportError::Mail(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: EmailMessage) -> ReportResult<()> {
        let to = message.to.clone();
        let email = self.build(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| ReportError::Mail(format!("Failed to send email via SMTP: {}", e)))?;

        debug!("Mail sent to {}", to);
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> ReportResult<Mailbox> {
    address
        .parse()
        .map_err(|e| ReportError::Mail(format!("Invalid address {}: {}", address, e)))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: None,
            password: None,
            from_email: "reports@example.com".into(),
            from_name: "Reports".into(),
            reply_to: Some("ops@example.com".into()),
        }
    }

    #[tokio::test]
    async fn test_builds_plain_and_attachment_messages() {
        let mailer = SmtpMailer::new(&config()).unwrap();

        let plain = mailer
            .build(EmailMessage::text("ops@example.com", "[HEX] 0 alerts", "No alerts to report."))
            .unwrap();
        let raw = String::from_utf8(plain.formatted()).unwrap();
        assert!(raw.contains("Subject: [HEX] 0 alerts"));
        assert!(raw.contains("Reply-To: ops@example.com"));

        let mut with_csv = EmailMessage::text("ops@example.com", "CSVs", "See attached CSVs");
        with_csv.attachments.push(Attachment {
            file_name: "report.csv".into(),
            content_type: "text/csv".into(),
            content: b"a,b\n1,2\n".to_vec(),
        });
        let raw = String::from_utf8(mailer.build(with_csv).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("filename=\"report.csv\""));
    }

    #[tokio::test]
    async fn test_rejects_bad_recipient() {
        let mailer = SmtpMailer::new(&config()).unwrap();
        let result = mailer.build(EmailMessage::text("not an address", "s", "b"));
        assert!(matches!(result, Err(ReportError::Mail(_))));
    }
}

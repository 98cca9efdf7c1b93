//! Mail transport boundary and its SMTP implementation.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::SmtpConfig;
use crate::error::{Error, Result};
use crate::notify::AlertMessage;

/// Something that can put an alert email on the wire.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver `message` to the configured recipient.
    async fn deliver(&self, message: &AlertMessage) -> Result<()>;
}

/// [`MailTransport`] over SMTP with `lettre`.
///
/// Port 465 connects with implicit TLS; any other port upgrades with
/// STARTTLS. Alerts are sent from the authenticating account.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from `config`. No connection is made until the first
    /// delivery.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.auth_email.clone(),
                config.auth_credential.clone(),
            ))
            .timeout(Some(config.timeout()))
            .build();

        Ok(Self {
            transport,
            from: config.auth_email.parse()?,
            to: config.recipient_email.parse()?,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, message: &AlertMessage) -> Result<()> {
        let email = build_email(&self.from, &self.to, message)?;
        let response = self.transport.send(email).await?;
        debug!("SMTP server replied {}", response.code());
        Ok(())
    }
}

/// Assemble the MIME message for `message`.
pub(crate) fn build_email(from: &Mailbox, to: &Mailbox, message: &AlertMessage) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| Error::EmailBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_email() {
        let from: Mailbox = "tub@example.com".parse().unwrap();
        let to: Mailbox = "owner@example.com".parse().unwrap();
        let message = AlertMessage {
            subject: "[Hot Tub] Water temperature above limit".to_string(),
            body: "The water probe read 41.0°C.\n".to_string(),
        };

        let email = build_email(&from, &to, &message).unwrap();
        let formatted = String::from_utf8_lossy(&email.formatted()).to_string();

        assert!(formatted.contains("From: tub@example.com"));
        assert!(formatted.contains("To: owner@example.com"));
        assert!(formatted.contains("Subject: [Hot Tub] Water temperature above limit"));
        assert!(formatted.contains("Content-Type: text/plain"));
    }

    #[test]
    fn test_bad_address() {
        assert!(matches!(
            "not-an-email".parse::<Mailbox>().map_err(Error::from),
            Err(Error::Address(_))
        ));
    }
}

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid email address")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email account credentials are not configured")]
    MissingCredentials,
}

/// A plain-text message to a single recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

/// Sends mail through an authenticated SMTP relay (Gmail by default)
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(NotifyError::MissingCredentials);
        };

        let from: Mailbox = username.parse()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(username.clone(), password.clone()));
        if let Some(port) = config.smtp_port {
            builder = builder.port(port);
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let message = self.build_message(email)?;
        let response = self.transport.send(message).await?;
        tracing::debug!("SMTP accepted message to {}: {:?}", email.to, response.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_config() -> EmailConfig {
        EmailConfig {
            admin_email: Some("admin@example.com".to_string()),
            username: Some("bot@example.com".to_string()),
            password: Some("app-password".to_string()),
            ..EmailConfig::default()
        }
    }

    #[test]
    fn test_missing_credentials() {
        let config = EmailConfig::default();
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(NotifyError::MissingCredentials)
        ));
    }

    #[test]
    fn test_invalid_sender_address() {
        let config = EmailConfig {
            username: Some("not an address".to_string()),
            ..email_config()
        };
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(NotifyError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_recipient() {
        let mailer = SmtpMailer::from_config(&email_config()).unwrap();
        let email = OutgoingEmail {
            to: "nobody".to_string(),
            subject: "CRM Automation Report".to_string(),
            body: "body".to_string(),
        };
        assert!(mailer.build_message(&email).is_err());
    }

    #[tokio::test]
    async fn test_build_message() {
        let mailer = SmtpMailer::from_config(&email_config()).unwrap();
        let email = OutgoingEmail {
            to: "admin@example.com".to_string(),
            subject: "CRM Automation Report".to_string(),
            body: "Total contacts processed: 1".to_string(),
        };

        let message = mailer.build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: CRM Automation Report"));
        assert!(raw.contains("To: admin@example.com"));
        assert!(raw.contains("Total contacts processed: 1"));
    }
}

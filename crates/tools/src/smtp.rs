//! SMTP delivery for the email tool, authenticated with the sender's app
//! password over STARTTLS.

use crate::send_email::{EmailMessage, MailCredentials, Mailer};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use oracle_config::EmailConfig;
use std::sync::Arc;
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Sends through an SMTP relay such as `smtp.gmail.com:587`.
pub struct SmtpMailer {
    host: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

fn mailbox(field: &str, address: &str) -> Result<Mailbox, String> {
    address
        .parse()
        .map_err(|e| format!("invalid {field} address '{address}': {e}"))
}

/// Build the MIME message: plain-text body, optional CC.
pub(crate) fn build_message(message: &EmailMessage) -> Result<Message, String> {
    let mut builder = Message::builder()
        .from(mailbox("sender", &message.from)?)
        .to(mailbox("recipient", &message.to)?)
        .subject(message.subject.as_str());
    if let Some(cc) = &message.cc {
        builder = builder.cc(mailbox("cc", cc)?);
    }
    builder
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| format!("could not build email: {e}"))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, credentials: &MailCredentials, message: &EmailMessage) -> Result<(), String> {
        let email = build_message(message)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| format!("cannot reach {}: {e}", self.host))?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.sender.clone(),
                credentials.app_password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| format!("SMTP delivery failed: {e}"))
    }
}

/// The mailer for this configuration: SMTP when sender credentials are set.
pub fn mailer_for(config: &EmailConfig) -> Option<Arc<dyn Mailer>> {
    config
        .is_configured()
        .then(|| Arc::new(SmtpMailer::new(config.smtp_host.clone(), config.smtp_port)) as Arc<dyn Mailer>)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "bruce@wayne.example".into(),
            to: "alfred@wayne.example".into(),
            cc: Some("lucius@wayne.example".into()),
            subject: "Dinner".into(),
            body: "Eight o'clock.".into(),
        }
    }

    #[test]
    fn message_envelope_includes_cc() {
        let email = build_message(&message()).unwrap();
        let recipients: Vec<String> = email.envelope().to().iter().map(|a| a.to_string()).collect();
        assert_eq!(recipients, vec!["alfred@wayne.example", "lucius@wayne.example"]);
        assert_eq!(
            email.envelope().from().map(|a| a.to_string()).as_deref(),
            Some("bruce@wayne.example")
        );
    }

    #[test]
    fn bad_recipient_is_reported() {
        let mut bad = message();
        bad.to = "alfred@".into();
        let err = build_message(&bad).unwrap_err();
        assert!(err.contains("recipient"), "{err}");
    }

    #[test]
    fn configured_credentials_select_smtp() {
        let mut config = EmailConfig::default();
        assert!(mailer_for(&config).is_none());

        config.sender = Some("bruce@wayne.example".into());
        config.app_password = Some("app-pw".into());
        assert!(mailer_for(&config).is_some());

        let smtp = SmtpMailer::new(config.smtp_host.clone(), config.smtp_port);
        assert_eq!((smtp.host(), smtp.port()), ("smtp.gmail.com", 587));
    }
}

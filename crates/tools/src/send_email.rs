//! Email tool — validates the request and hands delivery to a [`Mailer`].
//!
//! SMTP itself lives behind the `Mailer` trait; this tool owns the sender
//! credentials check, recipient handling and the spoken confirmation.

use async_trait::async_trait;
use oracle_core::error::ToolError;
use oracle_core::tool::{Capability, Tool, ToolOutput};
use std::sync::Arc;

const TOOL_NAME: &str = "send_email";

/// A fully-addressed outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Every address the message is delivered to.
    pub fn recipients(&self) -> Vec<&str> {
        let mut all = vec![self.to.as_str()];
        if let Some(cc) = &self.cc {
            all.push(cc.as_str());
        }
        all
    }
}

/// Delivers messages. Implementations own the transport (SMTP, an HTTP relay).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, credentials: &MailCredentials, message: &EmailMessage) -> Result<(), String>;
}

/// Sender account used to authenticate with the mail transport.
#[derive(Clone)]
pub struct MailCredentials {
    pub sender: String,
    pub app_password: String,
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("sender", &self.sender)
            .field("app_password", &"[REDACTED]")
            .finish()
    }
}

/// Mailer used when no transport is wired in; every send fails.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, _credentials: &MailCredentials, _message: &EmailMessage) -> Result<(), String> {
        Err("no mail transport is configured".into())
    }
}

pub struct SendEmailTool {
    credentials: Option<MailCredentials>,
    mailer: Arc<dyn Mailer>,
}

impl SendEmailTool {
    pub fn new(sender: Option<String>, app_password: Option<String>, mailer: Arc<dyn Mailer>) -> Self {
        let credentials = match (sender, app_password) {
            (Some(sender), Some(app_password)) if !sender.trim().is_empty() && !app_password.trim().is_empty() => {
                Some(MailCredentials { sender, app_password })
            }
            _ => None,
        };
        Self { credentials, mailer }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Send an email on the user's behalf. Only report success if this tool confirms the email was sent."
    }

    fn capability(&self) -> Capability {
        Capability::Email
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to_email": { "type": "string", "description": "Recipient address", "minLength": 3 },
                "subject": { "type": "string", "description": "Subject line" },
                "message": { "type": "string", "description": "Plain-text body", "minLength": 1 },
                "cc_email": { "type": "string", "description": "Optional CC address" }
            },
            "required": ["to_email", "subject", "message"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let Some(credentials) = &self.credentials else {
            return Err(ToolError::failed(TOOL_NAME, "email credentials are not configured"));
        };

        let to = arguments["to_email"].as_str().unwrap_or_default().trim().to_string();
        if !to.contains('@') {
            return Err(ToolError::invalid(TOOL_NAME, format!("'{to}' is not an email address")));
        }
        let cc = arguments["cc_email"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        let message = EmailMessage {
            from: credentials.sender.clone(),
            to,
            cc,
            subject: arguments["subject"].as_str().unwrap_or_default().to_string(),
            body: arguments["message"].as_str().unwrap_or_default().to_string(),
        };

        self.mailer
            .send(credentials, &message)
            .await
            .map_err(|reason| ToolError::failed(TOOL_NAME, reason))?;

        tracing::info!(to = %message.to, cc = message.cc.is_some(), "Email sent");
        Ok(ToolOutput::text(format!("Email sent successfully to {}.", message.to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, _credentials: &MailCredentials, message: &EmailMessage) -> Result<(), String> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn args() -> serde_json::Value {
        serde_json::json!({
            "to_email": "alfred@wayne.example",
            "subject": "Dinner",
            "message": "Eight o'clock.",
            "cc_email": " lucius@wayne.example "
        })
    }

    #[tokio::test]
    async fn missing_credentials_fail() {
        let tool = SendEmailTool::new(None, None, Arc::new(UnconfiguredMailer));
        let err = tool.execute(args()).await.unwrap_err();
        assert_eq!(err.marker(), "tool_execution_error");
    }

    #[tokio::test]
    async fn sends_through_mailer() {
        let mailer = Arc::new(RecordingMailer::default());
        let tool = SendEmailTool::new(Some("bruce@wayne.example".into()), Some("pw".into()), mailer.clone());
        let out = tool.execute(args()).await.unwrap();
        assert_eq!(out.output, "Email sent successfully to alfred@wayne.example.");

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "bruce@wayne.example");
        assert_eq!(sent[0].recipients(), vec!["alfred@wayne.example", "lucius@wayne.example"]);
    }

    #[tokio::test]
    async fn transport_failure_is_execution_error() {
        let tool = SendEmailTool::new(Some("bruce@wayne.example".into()), Some("pw".into()), Arc::new(UnconfiguredMailer));
        let err = tool.execute(args()).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn rejects_malformed_address() {
        let tool = SendEmailTool::new(Some("b@w".into()), Some("pw".into()), Arc::new(RecordingMailer::default()));
        let mut bad = args();
        bad["to_email"] = serde_json::json!("alfred");
        assert!(matches!(tool.execute(bad).await, Err(ToolError::InvalidArguments { .. })));
    }

    #[test]
    fn credentials_are_redacted() {
        let creds = MailCredentials { sender: "b@w".into(), app_password: "hunter2".into() };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}

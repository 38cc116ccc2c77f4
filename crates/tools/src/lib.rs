//! Built-in tool implementations for Oracle.
//!
//! Tools give the agent access to real-world data: the local clock, the
//! weather, the web, email, and the user's long-term memory. The set is
//! closed: every built-in is a variant of [`BuiltinTool`], and the registry
//! is frozen once the session activates.

pub mod local_time;
pub mod recall_memory;
pub mod send_email;
pub mod smtp;
pub mod weather;
pub mod web_search;

use async_trait::async_trait;
use oracle_config::AppConfig;
use oracle_core::error::ToolError;
use oracle_core::memory::MemoryStore;
use oracle_core::tool::{Capability, Tool, ToolOutput, ToolRegistry, ToolRegistryBuilder};
use std::sync::Arc;

pub use local_time::LocalTimeTool;
pub use oracle_core::tool::RECALL_TOOL_NAME;
pub use recall_memory::RecallMemoryTool;
pub use send_email::{EmailMessage, MailCredentials, Mailer, SendEmailTool, UnconfiguredMailer};
pub use smtp::{mailer_for, SmtpMailer};
pub use weather::WeatherTool;
pub use web_search::WebSearchTool;

/// The closed set of built-in tools.
pub enum BuiltinTool {
    LocalTime(LocalTimeTool),
    Weather(WeatherTool),
    WebSearch(WebSearchTool),
    SendEmail(SendEmailTool),
    RecallMemory(RecallMemoryTool),
}

impl BuiltinTool {
    fn inner(&self) -> &dyn Tool {
        match self {
            Self::LocalTime(t) => t,
            Self::Weather(t) => t,
            Self::WebSearch(t) => t,
            Self::SendEmail(t) => t,
            Self::RecallMemory(t) => t,
        }
    }
}

#[async_trait]
impl Tool for BuiltinTool {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn description(&self) -> &str {
        self.inner().description()
    }

    fn capability(&self) -> Capability {
        self.inner().capability()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner().parameters_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.inner().execute(arguments).await
    }
}

/// Every built-in tool, configured for one session's user.
pub fn builtin_tools(
    config: &AppConfig,
    memory: Arc<dyn MemoryStore>,
    mailer: Arc<dyn Mailer>,
) -> Vec<BuiltinTool> {
    let session = config.session_config();
    vec![
        BuiltinTool::LocalTime(LocalTimeTool::new(
            config.persona.utc_offset_minutes,
            config.persona.timezone_label.clone(),
        )),
        BuiltinTool::Weather(WeatherTool::new(config.default_city.clone())),
        BuiltinTool::WebSearch(WebSearchTool::new()),
        BuiltinTool::SendEmail(SendEmailTool::new(
            config.email.sender.clone(),
            config.email.app_password.clone(),
            mailer,
        )),
        BuiltinTool::RecallMemory(RecallMemoryTool::new(
            memory,
            session.user_id,
            session.recall_limit,
        )),
    ]
}

/// A registry builder preloaded with all built-in tools.
///
/// Callers may register extra tools before calling `build()`.
pub fn default_registry(
    config: &AppConfig,
    memory: Arc<dyn MemoryStore>,
    mailer: Arc<dyn Mailer>,
) -> ToolRegistryBuilder {
    builtin_tools(config, memory, mailer)
        .into_iter()
        .fold(ToolRegistry::builder(), |builder, tool| builder.register(Arc::new(tool)))
}

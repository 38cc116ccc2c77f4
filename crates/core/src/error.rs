//! Error types for the Oracle domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Oracle operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Language model errors ---
    #[error("Model error: {0}")]
    Provider(#[from] ProviderError),

    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Session lifecycle ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Context assembly ---
    #[error("Context overflow: {required_tokens} tokens required, budget is {budget}")]
    ContextOverflow { required_tokens: usize, budget: usize },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("Transport connection lost: {0}")]
    ConnectionLost(String),

    #[error("Response delivery failed: {0}")]
    DeliveryFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// The store could not be reached (network, missing backend).
    #[error("Memory store unavailable: {0}")]
    Unavailable(String),

    /// A commit was rejected or only partially applied.
    #[error("Memory commit failed: {0}")]
    CommitFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Every tool failure is standardized into one of these variants before it
/// reaches the turn context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// Stable marker injected into the model context for this failure.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "tool_not_found",
            Self::InvalidArguments { .. } => "invalid_tool_arguments",
            Self::Timeout { .. } => "tool_timeout",
            Self::ExecutionFailed { .. } => "tool_execution_error",
        }
    }

    /// Shorthand used by tool implementations.
    pub fn failed(tool_name: &str, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand used by tool implementations and schema validation.
    pub fn invalid(tool_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Operation '{operation}' not allowed in phase {phase}")]
    InvalidPhase { operation: String, phase: String },

    #[error("Tool registry already consumed")]
    RegistryConsumed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_markers_are_stable() {
        assert_eq!(ToolError::NotFound("x".into()).marker(), "tool_not_found");
        assert_eq!(ToolError::invalid("x", "bad").marker(), "invalid_tool_arguments");
        assert_eq!(
            ToolError::Timeout { tool_name: "get_weather".into(), timeout_secs: 3 }.marker(),
            "tool_timeout"
        );
        assert_eq!(ToolError::failed("x", "boom").marker(), "tool_execution_error");
    }

    #[test]
    fn tool_error_displays_tool_name() {
        let err = Error::Tool(ToolError::Timeout {
            tool_name: "get_weather".into(),
            timeout_secs: 10,
        });
        assert!(err.to_string().contains("get_weather"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn overflow_displays_budget() {
        let err = Error::ContextOverflow { required_tokens: 900, budget: 512 };
        assert!(err.to_string().contains("900"));
        assert!(err.to_string().contains("512"));
    }
}

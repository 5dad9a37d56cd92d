//! Unified error taxonomy for the coordination core.
//!
//! Mirrors `tool_protocol::ToolError`'s style in the surrounding ecosystem:
//! a hand-written enum with a manual `Display` implementation rather than a
//! derive macro, so the error messages stay exactly as written here.

use std::fmt;

/// Tool-specific failure, kept distinct from [`CoreError`] the same way the
/// wider stack keeps tool errors separate from gateway errors: a tool
/// failing is an application-level event, not a transport-level one.
#[derive(Debug, Clone)]
pub enum ToolError {
    NotFound(String),
    ExecutionFailed(String),
    InvalidParameters(String),
    ProtocolError(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "tool not found: {}", name),
            ToolError::ExecutionFailed(msg) => write!(f, "tool execution failed: {}", msg),
            ToolError::InvalidParameters(msg) => write!(f, "invalid tool parameters: {}", msg),
            ToolError::ProtocolError(msg) => write!(f, "tool protocol error: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// The gateway returned something the caller couldn't parse or use
    /// (malformed structured output, missing expected field, etc).
    InvalidResponse(String),
    /// The requested model identifier isn't supported by the gateway.
    ModelNotSupported(String),
    /// An operation exceeded its deadline (`wait_for_empty`, `wait_for_events`,
    /// a gateway call wrapped in `tokio::time::timeout`).
    Timeout,
    /// Catch-all for gateway-side failures not covered by a more specific
    /// variant below.
    GatewayError(String),
    /// The remote API rejected the request at the application layer.
    ApiError(String),
    /// The remote API rejected the request at the transport layer.
    HttpError(u16),
    /// A request could not be sent or completed for a reason not otherwise
    /// classified (DNS failure, connection reset, etc).
    RequestFailed(String),
    /// A tool invocation failed; wraps the underlying [`ToolError`]'s message.
    ToolError(String),
    /// Invalid or missing configuration.
    ConfigError(String),
    /// Failed to serialize or deserialize a payload.
    SerializationError(String),
    /// An [`crate::aggregator::AsyncAggregator`] reducer returned `{error,
    /// reason}`; every waiter blocked on that correlation id is failed with
    /// this variant rather than left pending forever (see DESIGN.md).
    ReducerFailed(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
            CoreError::ModelNotSupported(model) => write!(f, "model not supported: {}", model),
            CoreError::Timeout => write!(f, "operation timed out"),
            CoreError::GatewayError(msg) => write!(f, "gateway error: {}", msg),
            CoreError::ApiError(msg) => write!(f, "api error: {}", msg),
            CoreError::HttpError(status) => write!(f, "http error: {}", status),
            CoreError::RequestFailed(reason) => write!(f, "request failed: {}", reason),
            CoreError::ToolError(msg) => write!(f, "tool error: {}", msg),
            CoreError::ConfigError(msg) => write!(f, "config error: {}", msg),
            CoreError::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            CoreError::ReducerFailed(reason) => write!(f, "reducer failed: {}", reason),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<ToolError> for CoreError {
    fn from(err: ToolError) -> Self {
        CoreError::ToolError(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

//! Provider-agnostic chat message and tool-call data model (spec §3).
//!
//! Shapes mirror `client_wrapper::{Message, Role, NativeToolCall,
//! ToolDefinition}` closely — `Arc<str>` content so histories clone
//! cheaply, a `Role::Tool { call_id }` variant correlating a tool result
//! back to the assistant call that requested it.

use std::sync::Arc;

use serde_json::Value;

#[derive(Debug, Clone)]
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool-result message. `call_id` must match the `id` of the
    /// [`ToolCall`] it answers.
    Tool { call_id: String },
}

/// A single tool invocation requested by the model in an assistant
/// message.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Schema describing one tool, as sent to the gateway alongside a
/// generation request.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Arc<str>,
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(content: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Message {
            role: Role::Tool { call_id: call_id.into() },
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Token accounting for a single gateway call, when the backend reports it.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// A single incremental piece of a streaming generation (spec §4.4): a
/// `{content, chunk}` fragment, or the `{tool_calls, list}` the gateway
/// accumulated once the stream ends. A chunk carrying tool calls has empty
/// `content`; a content chunk has empty `tool_calls`.
#[derive(Debug, Clone, Default)]
pub struct MessageChunk {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

impl MessageChunk {
    pub fn text(content: impl Into<String>) -> Self {
        MessageChunk {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: None,
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        MessageChunk {
            content: String::new(),
            tool_calls,
            finish_reason: None,
        }
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }
}

/// A gateway's response to a plain generation request: the message plus
/// whatever usage accounting it reported. `thinking` carries a reasoning
/// model's extended-thinking trace when the gateway surfaces one (spec §3);
/// most gateways leave it `None`.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub message: Message,
    pub usage: Option<TokenUsage>,
    pub thinking: Option<Arc<str>>,
}

/// `response_format`'s two recognized shapes (spec §3): free text, or JSON
/// constrained to an optional schema.
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    Text,
    JsonObject { schema: Option<Value> },
}

/// Hint passed to gateways whose backing model supports variable reasoning
/// budgets (spec §3). Gateways that don't support it simply ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// Tunables forwarded to a [`crate::gateway::Gateway`] call.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub temperature: f32,
    pub num_ctx: usize,
    pub max_tokens: usize,
    pub num_predict: Option<usize>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub response_format: Option<ResponseFormat>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub stop: Vec<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        CompletionConfig {
            temperature: 1.0,
            num_ctx: 32768,
            max_tokens: 16384,
            num_predict: None,
            top_p: None,
            top_k: None,
            response_format: None,
            reasoning_effort: None,
            stop: Vec::new(),
        }
    }
}

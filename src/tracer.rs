//! Observation hooks for the broker and solver, following the same
//! null-object pattern as `EventHandler` in the wider ecosystem: every
//! method defaults to a no-op so instrumentation is opt-in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A single gateway call's outcome, reported once the call returns.
#[derive(Debug, Clone)]
pub struct LLMCallSpan {
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// A single tool invocation's outcome. Carries the call's arguments and
/// result content per spec §4.4 ("ToolCall with arguments, result, and
/// duration"), not just a pass/fail flag.
#[derive(Debug, Clone)]
pub struct ToolCallSpan {
    pub tool_name: String,
    pub arguments: Value,
    pub result: String,
    pub duration_ms: u64,
    pub success: bool,
}

/// Receives spans from [`crate::broker::Broker`] and [`crate::solver`] as
/// they complete. A tracer shared across tasks must be internally
/// synchronized by its own implementation; the core never wraps it in a
/// lock on the caller's behalf.
#[async_trait]
pub trait Tracer: Send + Sync {
    async fn on_llm_call(&self, _span: &LLMCallSpan) {}
    async fn on_tool_call(&self, _span: &ToolCallSpan) {}
}

/// The default tracer: observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

#[async_trait]
impl Tracer for NullTracer {}

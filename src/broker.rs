//! Façade over a pluggable [`Gateway`] with recursive tool-call resolution.
//!
//! Reporting to the tracer follows the same "emit to an optional observer"
//! idiom used across this stack for agent lifecycle events — here it's
//! always-present (defaulting to [`NullTracer`](crate::tracer::NullTracer))
//! rather than `Option`, since a broker without a tracer still needs
//! somewhere to send spans.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::StreamExt;

use crate::error::CoreError;
use crate::gateway::{Gateway, MessageChunkStream};
use crate::message::{CompletionConfig, Message, ToolCall};
use crate::tool::ToolRegistry;
use crate::tracer::{LLMCallSpan, ToolCallSpan, Tracer};

/// Default cap on recursive tool-call resolution rounds within a single
/// [`Broker::generate`] call, independent of any solver-level iteration
/// cap — this bounds one *turn*, not one *goal*.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 8;

pub struct Broker {
    gateway: Arc<dyn Gateway>,
    tools: Arc<ToolRegistry>,
    tracer: Arc<dyn Tracer>,
    max_tool_iterations: usize,
}

impl Broker {
    pub fn new(gateway: Arc<dyn Gateway>, tools: Arc<ToolRegistry>) -> Self {
        Broker {
            gateway,
            tools,
            tracer: Arc::new(crate::tracer::NullTracer),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    /// Generates a response, recursively resolving any tool calls the
    /// model makes until it returns a message with none, or
    /// `max_tool_iterations` rounds have elapsed. Each round builds a
    /// fresh message vector rather than mutating a shared one, so a
    /// `Broker` is safe to drive the same conversation from multiple
    /// concurrent call sites as long as its [`Gateway`] is.
    pub async fn generate(
        &self,
        messages: &[Message],
        config: &CompletionConfig,
    ) -> Result<Message, CoreError> {
        let mut conversation: Vec<Message> = messages.to_vec();
        let tool_defs = self.tools.definitions().await;
        let tools = if tool_defs.is_empty() { None } else { Some(tool_defs.as_slice()) };

        for _ in 0..=self.max_tool_iterations {
            let started_at = Utc::now();
            let started = Instant::now();
            let response = self.gateway.generate(&conversation, tools, config).await?;
            self.tracer
                .on_llm_call(&LLMCallSpan {
                    model: self.gateway.model_name().to_string(),
                    started_at,
                    duration_ms: started.elapsed().as_millis() as u64,
                    input_tokens: response.usage.as_ref().map(|u| u.input_tokens as u64),
                    output_tokens: response.usage.as_ref().map(|u| u.output_tokens as u64),
                })
                .await;

            if response.message.tool_calls.is_empty() {
                return Ok(response.message);
            }

            conversation.push(response.message.clone());
            for call in &response.message.tool_calls {
                let result_message = self.resolve_tool_call(call).await;
                conversation.push(result_message);
            }
        }

        Err(CoreError::InvalidResponse(
            "exceeded max tool-call resolution iterations without a final answer".to_string(),
        ))
    }

    async fn resolve_tool_call(&self, call: &ToolCall) -> Message {
        resolve_tool_call(&self.tools, self.tracer.as_ref(), call).await
    }

    /// Structured generation constrained to `schema`. Unlike [`Self::generate`],
    /// this does not recurse through tool calls — it's used by solvers for
    /// their decision step, where the response shape is the point.
    pub async fn generate_object(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
        config: &CompletionConfig,
    ) -> Result<serde_json::Value, CoreError> {
        self.gateway.generate_object(messages, schema, config).await
    }

    /// Streaming generation with the same recursive tool-call resolution as
    /// [`Self::generate`], composed as a flat generator per spec §4.4/§9
    /// rather than nested callbacks: each round's chunks are yielded as they
    /// arrive; if the round's stream ends with accumulated tool calls, they
    /// are executed and the follow-up round's chunks are yielded next, in
    /// order, from the same generator. Tool-call chunks themselves are
    /// consumed internally, never forwarded — callers see only text.
    ///
    /// Returns `Ok(None)` if the gateway doesn't support streaming at all
    /// (mirrors [`Gateway::generate_stream`]'s own `Ok(None)` contract).
    pub async fn generate_stream(
        &self,
        messages: &[Message],
        config: &CompletionConfig,
    ) -> Result<Option<MessageChunkStream>, CoreError> {
        let tool_defs = self.tools.definitions().await;
        let tool_slice = if tool_defs.is_empty() { None } else { Some(tool_defs.as_slice()) };

        let first_stream = match self.gateway.generate_stream(messages, tool_slice, config).await? {
            Some(stream) => stream,
            None => return Ok(None),
        };

        let gateway = self.gateway.clone();
        let tools = self.tools.clone();
        let tracer = self.tracer.clone();
        let max_iterations = self.max_tool_iterations;
        let mut conversation: Vec<Message> = messages.to_vec();
        let config = config.clone();

        let stream = async_stream::try_stream! {
            let mut pending_stream = Some(first_stream);

            for _ in 0..=max_iterations {
                let inner = match pending_stream.take() {
                    Some(stream) => stream,
                    None => {
                        let tool_defs = tools.definitions().await;
                        let tool_slice = if tool_defs.is_empty() { None } else { Some(tool_defs.as_slice()) };
                        match gateway.generate_stream(&conversation, tool_slice, &config).await? {
                            Some(stream) => stream,
                            None => break,
                        }
                    }
                };
                futures_util::pin_mut!(inner);

                let mut accumulated_content = String::new();
                let mut accumulated_tool_calls: Vec<ToolCall> = Vec::new();

                while let Some(chunk) = inner.next().await {
                    let chunk = chunk?;
                    if !chunk.tool_calls.is_empty() {
                        accumulated_tool_calls.extend(chunk.tool_calls);
                        continue;
                    }
                    if !chunk.content.is_empty() {
                        accumulated_content.push_str(&chunk.content);
                        yield chunk;
                    }
                }

                if accumulated_tool_calls.is_empty() {
                    break;
                }

                conversation.push(
                    Message::assistant(accumulated_content).with_tool_calls(accumulated_tool_calls.clone()),
                );
                for call in &accumulated_tool_calls {
                    let result_message = resolve_tool_call(&tools, tracer.as_ref(), call).await;
                    conversation.push(result_message);
                }
            }
        };

        Ok(Some(Box::pin(stream)))
    }

    /// Consumes a stream into a single concatenated string, for callers
    /// that want streaming under the hood but a plain result.
    pub async fn collect_stream(stream: MessageChunkStream) -> Result<String, CoreError> {
        let mut out = String::new();
        let mut stream = stream;
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk?.content);
        }
        Ok(out)
    }
}

/// Executes one tool call and reports it to the tracer. Free-standing
/// (rather than a `&self` method) so [`Broker::generate_stream`]'s
/// generator can call it after cloning only the `Arc`s it needs, without
/// capturing a `&Broker` that wouldn't outlive the returned stream.
async fn resolve_tool_call(tools: &ToolRegistry, tracer: &dyn Tracer, call: &ToolCall) -> Message {
    let started = Instant::now();
    let outcome = tools.execute(&call.name, call.arguments.clone()).await;
    let (content, success) = match &outcome {
        Ok(result) if result.success => (result.output.to_string(), true),
        Ok(result) => (
            result.error.clone().unwrap_or_else(|| "tool reported failure".to_string()),
            false,
        ),
        Err(err) => (err.to_string(), false),
    };

    tracer
        .on_tool_call(&ToolCallSpan {
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            result: content.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            success,
        })
        .await;

    Message::tool_result(call.id.clone(), content)
}

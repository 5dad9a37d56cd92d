//! The pluggable LLM backend contract (spec §6).
//!
//! Shaped directly on `ClientWrapper`: the same `send_message`/
//! `send_message_stream`/`model_name` trio, extended with a structured
//! "object" generation method the wider spec requires that the teacher's
//! trait doesn't — the Broker needs it to drive `ReactSolver`'s decision
//! step without hand-parsing free text every round.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::Stream;
use serde_json::Value;

use crate::error::CoreError;
use crate::message::{CompletionConfig, GatewayResponse, Message, ToolDefinition};

pub type MessageChunkStream =
    Pin<Box<dyn Stream<Item = Result<crate::message::MessageChunk, CoreError>> + Send>>;

/// A backend capable of turning a message history (optionally with tool
/// definitions) into a response. Implementations must be `Send + Sync` so
/// a single instance can be shared across the tasks a [`crate::broker::Broker`]
/// spawns for recursive tool resolution.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Plain request/response generation.
    async fn generate(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        config: &CompletionConfig,
    ) -> Result<GatewayResponse, CoreError>;

    /// Generation constrained to a JSON Schema. Implementations that can't
    /// natively constrain output may approximate by instructing the model
    /// to emit JSON and parsing the result, but must return
    /// [`CoreError::InvalidResponse`] rather than a malformed `Value` when
    /// parsing fails.
    async fn generate_object(
        &self,
        messages: &[Message],
        schema: &Value,
        config: &CompletionConfig,
    ) -> Result<Value, CoreError>;

    /// Streaming generation. Implementations that cannot stream return
    /// `Ok(None)`, mirroring `ClientWrapper::send_message_stream`'s default.
    async fn generate_stream(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        _config: &CompletionConfig,
    ) -> Result<Option<MessageChunkStream>, CoreError> {
        Ok(None)
    }

    /// Identifier of the model this gateway talks to, e.g. `"llama3.1"`.
    fn model_name(&self) -> &str;
}

#[cfg(feature = "ollama-gateway")]
pub mod ollama;

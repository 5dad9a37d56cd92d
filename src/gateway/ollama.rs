//! Illustrative [`Gateway`](super::Gateway) implementation talking to a
//! local Ollama-compatible HTTP endpoint. Not part of the coordination
//! core's contract surface — it exists only so the trait has a non-mock
//! implementation to exercise, gated behind the `ollama-gateway` feature
//! and read from `OLLAMA_HOST` per spec §6.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::message::{CompletionConfig, GatewayResponse, Message, Role, TokenUsage, ToolDefinition};

use super::Gateway;

const DEFAULT_HOST: &str = "http://localhost:11434";

pub struct OllamaGateway {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl OllamaGateway {
    pub fn new(model: impl Into<String>) -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        OllamaGateway {
            client: reqwest::Client::new(),
            host,
            model: model.into(),
        }
    }

    fn role_str(role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool { .. } => "tool",
        }
    }

    fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| json!({ "role": Self::role_str(&m.role), "content": m.content.as_ref() }))
            .collect()
    }

    fn options(config: &CompletionConfig) -> Value {
        let mut options = json!({
            "temperature": config.temperature,
            "num_ctx": config.num_ctx,
            "num_predict": config.num_predict.unwrap_or(config.max_tokens),
        });
        if let Some(top_p) = config.top_p {
            options["top_p"] = json!(top_p);
        }
        if let Some(top_k) = config.top_k {
            options["top_k"] = json!(top_k);
        }
        if !config.stop.is_empty() {
            options["stop"] = json!(config.stop);
        }
        options
    }
}

#[async_trait]
impl Gateway for OllamaGateway {
    async fn generate(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
        config: &CompletionConfig,
    ) -> Result<GatewayResponse, CoreError> {
        let body = json!({
            "model": self.model,
            "messages": Self::to_wire_messages(messages),
            "stream": false,
            "options": Self::options(config),
        });

        let resp = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CoreError::HttpError(resp.status().as_u16()));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;

        let content = parsed["message"]["content"]
            .as_str()
            .ok_or_else(|| CoreError::InvalidResponse("missing message.content".to_string()))?
            .to_string();

        let usage = parsed.get("prompt_eval_count").map(|_| TokenUsage {
            input_tokens: parsed["prompt_eval_count"].as_u64().unwrap_or(0) as usize,
            output_tokens: parsed["eval_count"].as_u64().unwrap_or(0) as usize,
            total_tokens: (parsed["prompt_eval_count"].as_u64().unwrap_or(0)
                + parsed["eval_count"].as_u64().unwrap_or(0)) as usize,
        });

        Ok(GatewayResponse {
            message: Message::assistant(content),
            usage,
            thinking: None,
        })
    }

    async fn generate_object(
        &self,
        messages: &[Message],
        schema: &Value,
        config: &CompletionConfig,
    ) -> Result<Value, CoreError> {
        let body = json!({
            "model": self.model,
            "messages": Self::to_wire_messages(messages),
            "stream": false,
            "format": schema,
            "options": Self::options(config),
        });

        let resp = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CoreError::HttpError(resp.status().as_u16()));
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;

        let content = parsed["message"]["content"]
            .as_str()
            .ok_or_else(|| CoreError::InvalidResponse("missing message.content".to_string()))?;

        serde_json::from_str(content)
            .map_err(|e| CoreError::InvalidResponse(format!("model did not return valid JSON: {}", e)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

//! The tool contract and a local name-to-implementation registry (spec §6).
//!
//! Trimmed from `tool_protocol::{ToolProtocol, Tool, ToolRegistry}` down to
//! single-process local dispatch: the teacher's version additionally routes
//! to remote MCP protocols, which is out of scope here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::ToolError;
use crate::message::ToolDefinition;

/// Outcome of running a tool.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        ToolResult {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ToolResult {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// A single invocable tool. `descriptor()` is consulted when building the
/// `tools` array sent alongside a generation request; `run()` executes an
/// invocation the model requested.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDefinition;
    async fn run(&self, arguments: Value) -> Result<ToolResult, ToolError>;
}

/// Resolves tool names to implementations. Registration is rare (usually
/// once at startup); lookups happen on every recursive tool-call
/// resolution step in the broker, so reads go through a `RwLock` rather
/// than a `Mutex`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name;
        self.tools.write().await.insert(name, tool);
    }

    pub async fn unregister(&self, name: &str) {
        self.tools.write().await.remove(name);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| t.descriptor())
            .collect()
    }

    pub async fn execute(&self, name: &str, arguments: Value) -> Result<ToolResult, ToolError> {
        match self.get(name).await {
            Some(tool) => tool.run(arguments).await,
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }
}

//! Tool trait definition.

use crate::process::ProcessRunner;
use crate::types::ToolResult;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Declaration of a tool exposed to the model's function-calling API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters; `None` for tools that take none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Handles shared by every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub runner: ProcessRunner,
    /// When false, tools that run arbitrary commands or code refuse.
    pub allow_execution: bool,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            runner: ProcessRunner::new(),
            allow_execution: true,
        }
    }
}

/// A built-in capability. Every tool takes one argument string.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in function calls and direct invocation).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Usage line shown by `/tools`.
    fn usage(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    ///
    /// Defaults to a single free-form `args` string carrying the same
    /// text a user would type after the tool name.
    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "args": {
                    "type": "string",
                    "description": self.usage()
                }
            }
        }))
    }

    /// Execute the tool with the given argument string.
    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult>;
}

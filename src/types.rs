//! Shared types used across the assistant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Tool results
// ---------------------------------------------------------------------------

/// Output of a tool invocation.
///
/// The presenter decides how each variant is rendered; the core only
/// guarantees that the variant and its payload reach it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResult {
    /// Style-free text.
    Text { text: String },
    /// Ordered key/value pairs.
    Structured { fields: Vec<(String, String)> },
    /// Rows of cells under a header.
    Tabular {
        title: String,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Hierarchical labelled nodes.
    Tree { root: TreeNode },
    /// A failure message.
    Error { message: String },
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn structured<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Structured {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Short variant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Structured { .. } => "structured",
            Self::Tabular { .. } => "tabular",
            Self::Tree { .. } => "tree",
            Self::Error { .. } => "error",
        }
    }

    /// Flatten any variant to plain text.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Error { message } => message.clone(),
            Self::Structured { fields } => fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Tabular {
                title,
                headers,
                rows,
            } => {
                let mut lines = Vec::with_capacity(rows.len() + 2);
                if !title.is_empty() {
                    lines.push(title.clone());
                }
                lines.push(headers.join("\t"));
                lines.extend(rows.iter().map(|r| r.join("\t")));
                lines.join("\n")
            }
            Self::Tree { root } => {
                let mut out = String::new();
                root.write_indented(&mut out, 0);
                out.trim_end().to_string()
            }
        }
    }
}

/// A node in a [`ToolResult::Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(TreeNode::leaf_count).sum()
        }
    }

    fn write_indented(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.label);
        out.push('\n');
        for child in &self.children {
            child.write_indented(out, depth + 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation messages
// ---------------------------------------------------------------------------

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    /// A tool request authored by the model.
    FunctionCall,
    /// The local answer to the preceding function call.
    FunctionResult,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
            Self::FunctionCall => write!(f, "function_call"),
            Self::FunctionResult => write!(f, "function_result"),
        }
    }
}

/// Body of a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
    FunctionCall(FunctionCallRequest),
    FunctionResult(FunctionResult),
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text { text: text.into() },
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: Content::Text { text: text.into() },
        }
    }

    pub fn function_call(call: FunctionCallRequest) -> Self {
        Self {
            role: Role::FunctionCall,
            content: Content::FunctionCall(call),
        }
    }

    pub fn function_result(result: FunctionResult) -> Self {
        Self {
            role: Role::FunctionResult,
            content: Content::FunctionResult(result),
        }
    }

    /// Text body, if this is a plain text message.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Whether the role tag agrees with the content shape.
    pub fn is_consistent(&self) -> bool {
        matches!(
            (self.role, &self.content),
            (Role::User | Role::Model, Content::Text { .. })
                | (Role::FunctionCall, Content::FunctionCall(_))
                | (Role::FunctionResult, Content::FunctionResult(_))
        )
    }

    /// One-line preview used by summaries and session listings.
    pub fn preview(&self, max_chars: usize) -> String {
        let body = match &self.content {
            Content::Text { text } => text.clone(),
            Content::FunctionCall(call) => {
                format!("{}({})", call.name, Value::Object(call.args.clone()))
            }
            Content::FunctionResult(result) => {
                format!("{} -> {}", result.name, Value::Object(result.response.clone()))
            }
        };
        truncate_chars(&body, max_chars)
    }
}

// ---------------------------------------------------------------------------
// Function calling
// ---------------------------------------------------------------------------

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl FunctionCallRequest {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Collapse the model's argument mapping into the single argument
    /// string every tool handler takes.
    ///
    /// - no arguments: empty string
    /// - an `args` string: that string
    /// - exactly one value: the value, strings unquoted
    /// - anything else: the mapping as JSON
    pub fn arg_string(&self) -> String {
        if self.args.is_empty() {
            return String::new();
        }
        if let Some(Value::String(s)) = self.args.get("args") {
            return s.clone();
        }
        if self.args.len() == 1 {
            if let Some(value) = self.args.values().next() {
                return value_to_string(value);
            }
        }
        Value::Object(self.args.clone()).to_string()
    }
}

/// The payload sent back to the model after a tool ran.
///
/// Always a flat mapping, as the function-calling API requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub name: String,
    #[serde(default)]
    pub response: Map<String, Value>,
}

impl FunctionResult {
    /// Coerce a tool result into the flat mapping sent to the model.
    ///
    /// Structured results keep their keys; errors are reported under
    /// `error`; every other variant is stringified under `result`.
    pub fn from_tool_result(name: impl Into<String>, result: &ToolResult) -> Self {
        let mut response = Map::new();
        match result {
            ToolResult::Structured { fields } => {
                for (k, v) in fields {
                    response.insert(k.clone(), Value::String(v.clone()));
                }
            }
            ToolResult::Error { message } => {
                response.insert("error".into(), Value::String(message.clone()));
            }
            other => {
                response.insert("result".into(), Value::String(other.to_plain_text()));
            }
        }
        Self {
            name: name.into(),
            response,
        }
    }

    pub fn is_error(&self) -> bool {
        self.response.contains_key("error")
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truncate to at most `max_chars` characters, appending an ellipsis.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

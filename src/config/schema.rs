//! Configuration schema for config.toml.

use serde::{Deserialize, Serialize};

/// Default system instruction sent with every chat.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a powerful terminal assistant. You can interact \
with the system, manage files (read, write, list, search), execute shell commands and Python code, \
compare files, manage Python packages, inspect Git repositories and processes, and open \
files/applications. Call the provided tools when they help answer the user. Help the user with \
coding, system tasks, and answering questions.";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Gemini API key. `GEMINI_API_KEY` takes precedence when set.
    pub api_key: String,

    /// Base URL of the Gemini REST API.
    pub api_base_url: String,

    /// Model used for chat turns.
    pub model: String,

    /// System instruction sent with every request.
    pub system_message: String,

    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,

    /// Presentation palette (`mono` disables colour).
    pub theme: String,

    /// Allow tools that run arbitrary commands or code.
    pub allow_execution: bool,

    /// Offer tool declarations to the model.
    pub enable_tools: bool,

    /// Function calls honoured after the first one in a single turn.
    pub max_follow_ups: usize,

    /// HTTP timeout for model requests.
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-2.0-flash".into(),
            system_message: DEFAULT_SYSTEM_MESSAGE.into(),
            temperature: 0.7,
            max_tokens: 2048,
            top_p: 0.95,
            top_k: 40,
            theme: "default".into(),
            allow_execution: true,
            enable_tools: true,
            max_follow_ups: 1,
            request_timeout_secs: 120,
            log_level: "warn".into(),
        }
    }
}

impl AssistantConfig {
    /// API key with the last four characters visible.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        match chars.len() {
            0 => "[Not Set]".into(),
            n if n <= 4 => "[Set]".into(),
            n => {
                let tail: String = chars[n - 4..].iter().collect();
                format!("{}{}", "*".repeat(n - 4), tail)
            }
        }
    }

    /// (setting, value) rows for display, secrets masked.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Model", self.model.clone()),
            ("Theme", self.theme.clone()),
            ("Temperature", self.temperature.to_string()),
            ("Top P", self.top_p.to_string()),
            ("Top K", self.top_k.to_string()),
            ("Max Tokens", self.max_tokens.to_string()),
            ("Allow Execution", self.allow_execution.to_string()),
            ("Enable Tools", self.enable_tools.to_string()),
            ("Max Follow Ups", self.max_follow_ups.to_string()),
            ("Request Timeout", format!("{}s", self.request_timeout_secs)),
            ("Log Level", self.log_level.clone()),
            ("System Message", crate::types::truncate_chars(&self.system_message, 60)),
            ("Api Key", self.masked_api_key()),
            ("Api Base Url", self.api_base_url.clone()),
        ]
    }
}

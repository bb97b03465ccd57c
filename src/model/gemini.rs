//! Gemini `generateContent` binding.
//!
//! The chat is kept client-side: each session owns the list of contents
//! sent so far and replays it with every request.

use super::{Candidate, ChatSession, ModelClient, ModelResponse, Part};
use crate::config::AssistantConfig;
use crate::error::CoreError;
use crate::tools::ToolDefinition;
use crate::types::{truncate_chars, Content, FunctionCallRequest, Message, Role};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// -- Gemini request/response types -------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [WireContent],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    generation_config: &'a GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: &'a [ToolDefinition],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
    block_reason_message: Option<String>,
}

// -- Conversions ---------------------------------------------------------------

/// Wire role for a history entry. Function calls are authored by the model.
fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model | Role::FunctionCall => "model",
        Role::FunctionResult => "function",
    }
}

fn to_wire(message: &Message) -> WireContent {
    let part = match &message.content {
        Content::Text { text } => WirePart {
            text: Some(text.clone()),
            ..WirePart::default()
        },
        Content::FunctionCall(call) => WirePart {
            function_call: Some(WireFunctionCall {
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            ..WirePart::default()
        },
        Content::FunctionResult(result) => WirePart {
            function_response: Some(WireFunctionResponse {
                name: result.name.clone(),
                response: result.response.clone(),
            }),
            ..WirePart::default()
        },
    };
    WireContent {
        role: Some(wire_role(message.role).to_string()),
        parts: vec![part],
    }
}

fn from_wire(response: GenerateResponse) -> ModelResponse {
    let candidates = response
        .candidates
        .into_iter()
        .map(|c| Candidate {
            parts: c
                .content
                .map(|content| content.parts)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| match (p.function_call, p.text) {
                    (Some(call), _) => Some(Part::FunctionCall(FunctionCallRequest::new(
                        call.name, call.args,
                    ))),
                    (None, Some(text)) => Some(Part::Text(text)),
                    (None, None) => None,
                })
                .collect(),
            finish_reason: c.finish_reason,
        })
        .collect();

    let (block_reason, block_reason_message) = response
        .prompt_feedback
        .map(|f| (f.block_reason, f.block_reason_message))
        .unwrap_or((None, None));

    ModelResponse {
        candidates,
        block_reason,
        block_reason_message,
    }
}

// -- Client --------------------------------------------------------------------

#[derive(Debug)]
struct Inner {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_instruction: Option<String>,
    generation: GenerationConfig,
    tools: Vec<ToolDefinition>,
}

/// Gemini model client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    inner: Arc<Inner>,
}

impl GeminiClient {
    /// Build a client from the assistant config. `tools` is empty when
    /// function calling is disabled.
    pub fn new(config: &AssistantConfig, tools: Vec<ToolDefinition>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let system_instruction = Some(config.system_message.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                system_instruction,
                generation: GenerationConfig {
                    temperature: config.temperature,
                    top_p: config.top_p,
                    top_k: config.top_k,
                    max_output_tokens: config.max_tokens,
                },
                tools,
            }),
        })
    }

    /// Same settings, different model.
    pub fn with_model(&self, model: &str) -> Self {
        let current = &self.inner;
        Self {
            inner: Arc::new(Inner {
                http: current.http.clone(),
                base_url: current.base_url.clone(),
                api_key: current.api_key.clone(),
                model: model.to_string(),
                system_instruction: current.system_instruction.clone(),
                generation: current.generation.clone(),
                tools: current.tools.clone(),
            }),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.inner.base_url, self.inner.model
        )
    }
}

impl ModelClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.inner.model
    }

    fn start_chat(&self, history: &[Message]) -> Box<dyn ChatSession> {
        Box::new(GeminiChat {
            client: self.clone(),
            contents: history.iter().map(to_wire).collect(),
        })
    }
}

struct GeminiChat {
    client: GeminiClient,
    contents: Vec<WireContent>,
}

impl GeminiChat {
    fn request(&self) -> GenerateRequest<'_> {
        let inner = &self.client.inner;
        GenerateRequest {
            contents: &self.contents,
            system_instruction: inner.system_instruction.as_ref().map(|text| WireContent {
                role: None,
                parts: vec![WirePart {
                    text: Some(text.clone()),
                    ..WirePart::default()
                }],
            }),
            generation_config: &inner.generation,
            tools: if inner.tools.is_empty() {
                Vec::new()
            } else {
                vec![WireTool {
                    function_declarations: &inner.tools,
                }]
            },
        }
    }

    async fn post(&self) -> Result<GenerateResponse, CoreError> {
        let inner = &self.client.inner;
        debug!(
            "Gemini request to model {} ({} contents)",
            inner.model,
            self.contents.len()
        );

        let resp = inner
            .http
            .post(self.client.endpoint())
            .header("x-goog-api-key", &inner.api_key)
            .json(&self.request())
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!("Gemini returned {}: {}", status, truncate_chars(&body, 500));
            return Err(classify_failure(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            CoreError::MalformedResponse(format!("{}: {}", e, truncate_chars(&body, 200)))
        })
    }
}

/// Map a non-success HTTP reply onto the error taxonomy.
fn classify_failure(status: u16, body: &str) -> CoreError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| truncate_chars(body.trim(), 300));
    if status == 400 && body.contains("SAFETY") {
        CoreError::SafetyBlocked(message)
    } else {
        CoreError::Transport(format!("HTTP {}: {}", status, message))
    }
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send_message(&mut self, message: &Message) -> Result<ModelResponse, CoreError> {
        self.contents.push(to_wire(message));
        match self.post().await {
            Ok(raw) => {
                if let Some(content) = raw.candidates.first().and_then(|c| c.content.clone()) {
                    self.contents.push(WireContent {
                        role: Some("model".into()),
                        parts: content.parts,
                    });
                }
                Ok(from_wire(raw))
            }
            Err(e) => {
                // The failed message was never accepted by the remote side.
                self.contents.pop();
                Err(e)
            }
        }
    }
}

//! Remote model boundary.
//!
//! The turn controller only sees these provider-neutral types; the Gemini
//! wire format lives in [`gemini`].

pub mod gemini;

pub use gemini::GeminiClient;

use crate::error::CoreError;
use crate::types::{FunctionCallRequest, Message};
use async_trait::async_trait;

/// One piece of a candidate's content.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCallRequest),
}

/// A single response candidate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub parts: Vec<Part>,
    /// e.g. `STOP`, `MAX_TOKENS`, `SAFETY`.
    pub finish_reason: Option<String>,
}

/// A decoded model response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelResponse {
    pub candidates: Vec<Candidate>,
    /// Set when the prompt itself was rejected.
    pub block_reason: Option<String>,
    pub block_reason_message: Option<String>,
}

impl ModelResponse {
    /// A single-candidate text answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_part(Part::Text(text.into()))
    }

    /// A single-candidate function call.
    pub fn function_call(call: FunctionCallRequest) -> Self {
        Self::from_part(Part::FunctionCall(call))
    }

    /// A prompt-level block with no candidates.
    pub fn blocked(reason: impl Into<String>, message: Option<String>) -> Self {
        Self {
            candidates: Vec::new(),
            block_reason: Some(reason.into()),
            block_reason_message: message,
        }
    }

    fn from_part(part: Part) -> Self {
        Self {
            candidates: vec![Candidate {
                parts: vec![part],
                finish_reason: Some("STOP".into()),
            }],
            ..Self::default()
        }
    }

    /// First part of the first candidate.
    pub fn first_part(&self) -> Option<&Part> {
        self.candidates.first().and_then(|c| c.parts.first())
    }
}

/// A stateful chat opened on a prefix of the history.
///
/// The session remembers every message it has sent and received, so a
/// follow-up only needs to carry the new message.
#[async_trait]
pub trait ChatSession: Send {
    async fn send_message(&mut self, message: &Message) -> Result<ModelResponse, CoreError>;
}

/// A configured remote model.
pub trait ModelClient: Send + Sync {
    fn model_name(&self) -> &str;

    /// Open a chat seeded with `history`.
    fn start_chat(&self, history: &[Message]) -> Box<dyn ChatSession>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn first_part_of_first_candidate() {
        let resp = ModelResponse::function_call(FunctionCallRequest::new("ps", Map::new()));
        assert!(matches!(resp.first_part(), Some(Part::FunctionCall(c)) if c.name == "ps"));
        assert_eq!(ModelResponse::default().first_part(), None);
        assert_eq!(
            ModelResponse::blocked("SAFETY", None).block_reason.as_deref(),
            Some("SAFETY")
        );
    }
}

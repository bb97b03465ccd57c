//! Ordered, append-only conversation history.

use crate::types::{Content, Message, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a message sequence breaks the call/result pairing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("message {index} has role '{role}' but mismatched content")]
    RoleMismatch { index: usize, role: Role },

    #[error("function_result at {index} has no preceding function_call")]
    OrphanResult { index: usize },

    #[error("function_call '{name}' at {index} is not followed by its result")]
    UnpairedCall { index: usize, name: String },

    #[error("function_result '{found}' at {index} answers call '{expected}'")]
    NameMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from persisted messages, refusing broken pairings.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, PairingError> {
        validate_pairing(&messages)?;
        Ok(Self { messages })
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Owned copy for readers outside the turn controller.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Check that every function_call is immediately answered by one
/// function_result with the same name, and that roles match content.
pub fn validate_pairing(messages: &[Message]) -> Result<(), PairingError> {
    let mut pending: Option<(usize, &str)> = None;

    for (index, message) in messages.iter().enumerate() {
        if !message.is_consistent() {
            return Err(PairingError::RoleMismatch {
                index,
                role: message.role,
            });
        }

        match (&message.content, pending) {
            (Content::FunctionResult(result), Some((_, expected))) => {
                if result.name != expected {
                    return Err(PairingError::NameMismatch {
                        index,
                        expected: expected.to_string(),
                        found: result.name.clone(),
                    });
                }
                pending = None;
            }
            (Content::FunctionResult(_), None) => {
                return Err(PairingError::OrphanResult { index });
            }
            (_, Some((call_index, name))) => {
                return Err(PairingError::UnpairedCall {
                    index: call_index,
                    name: name.to_string(),
                });
            }
            (Content::FunctionCall(call), None) => pending = Some((index, call.name.as_str())),
            (Content::Text { .. }, None) => {}
        }
    }

    match pending {
        Some((index, name)) => Err(PairingError::UnpairedCall {
            index,
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionCallRequest, FunctionResult, ToolResult};
    use serde_json::Map;

    fn call(name: &str) -> Message {
        Message::function_call(FunctionCallRequest::new(name, Map::new()))
    }

    fn result(name: &str) -> Message {
        Message::function_result(FunctionResult::from_tool_result(name, &ToolResult::text("ok")))
    }

    #[test]
    fn paired_sequence_is_valid() {
        let msgs = vec![
            Message::user("hi"),
            call("ps"),
            result("ps"),
            Message::model("done"),
            Message::user("again"),
        ];
        let history = History::from_messages(msgs).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.user_message_count(), 2);
    }

    #[test]
    fn trailing_call_is_unpaired() {
        let err = validate_pairing(&[Message::user("hi"), call("ps")]).unwrap_err();
        assert_eq!(
            err,
            PairingError::UnpairedCall {
                index: 1,
                name: "ps".into()
            }
        );
    }

    #[test]
    fn call_followed_by_text_is_unpaired() {
        let err = validate_pairing(&[call("ps"), Message::model("x")]).unwrap_err();
        assert!(matches!(err, PairingError::UnpairedCall { index: 0, .. }));
    }

    #[test]
    fn orphan_and_mismatched_results() {
        assert_eq!(
            validate_pairing(&[result("ps")]).unwrap_err(),
            PairingError::OrphanResult { index: 0 }
        );
        assert!(matches!(
            validate_pairing(&[call("ps"), result("sys_info")]).unwrap_err(),
            PairingError::NameMismatch { index: 1, .. }
        ));
    }

    #[test]
    fn role_content_disagreement() {
        let bad = Message {
            role: Role::User,
            content: Content::FunctionCall(FunctionCallRequest::new("ps", Map::new())),
        };
        assert!(matches!(
            validate_pairing(&[bad]).unwrap_err(),
            PairingError::RoleMismatch { index: 0, .. }
        ));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut history = History::new();
        history.push(Message::user("a"));
        let snap = history.snapshot();
        history.push(Message::model("b"));
        assert_eq!(snap.len(), 1);
        history.clear();
        assert!(history.is_empty());
    }
}

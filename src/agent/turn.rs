//! Conversation turn controller.
//!
//! One user message becomes one turn:
//! user → model → (function call → tool → function result → model)* → text.
//!
//! The loop keeps the call/result pairing intact on every exit path,
//! including interrupts, so a saved history always reloads.

use super::history::History;
use crate::error::CoreError;
use crate::model::{ModelClient, ModelResponse, Part};
use crate::tools::Dispatcher;
use crate::types::{FunctionCallRequest, FunctionResult, Message, ToolResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Text recorded as the function result of a tool cut short by Ctrl-C.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by user";

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Final model text, plus the tools run on the way.
    Response { text: String, tool_calls: Vec<String> },
    /// Model boundary failure. History keeps what was appended so far.
    Failed(CoreError),
    /// Cancelled by the user.
    Interrupted,
}

enum TurnState {
    /// Send this message on the open chat.
    ModelRequested(Message),
    /// A recorded call waiting for its result.
    ToolExecuting(FunctionCallRequest),
    FinalResponseReady(String),
}

/// What a model response asks for next.
enum Reply {
    Call(FunctionCallRequest),
    Text(String),
}

pub struct TurnController {
    model: Arc<dyn ModelClient>,
    dispatcher: Dispatcher,
    history: History,
    /// Tool round trips allowed per user message.
    max_follow_ups: usize,
}

impl TurnController {
    pub fn new(model: Arc<dyn ModelClient>, dispatcher: Dispatcher, max_follow_ups: usize) -> Self {
        Self {
            model,
            dispatcher,
            history: History::new(),
            max_follow_ups,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn replace_history(&mut self, history: History) {
        self.history = history;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn set_model(&mut self, model: Arc<dyn ModelClient>) {
        info!("Switching model to {}", model.model_name());
        self.model = model;
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one user turn to completion, failure or interrupt.
    pub async fn run_turn(&mut self, text: &str, cancel: &CancellationToken) -> TurnOutcome {
        self.history.push(Message::user(text));
        let seed_len = self.history.len() - 1;
        let mut chat = self.model.start_chat(&self.history.messages()[..seed_len]);
        debug!("Turn started on {} ({} prior messages)", self.model.model_name(), seed_len);

        let mut tool_calls: Vec<String> = Vec::new();
        let mut state = TurnState::ModelRequested(Message::user(text));

        loop {
            state = match state {
                TurnState::ModelRequested(outgoing) => {
                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("Model request interrupted");
                            return TurnOutcome::Interrupted;
                        }
                        r = chat.send_message(&outgoing) => r,
                    };

                    let reply = match response.and_then(read_reply) {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!("Turn failed: {}", e);
                            return TurnOutcome::Failed(e);
                        }
                    };

                    match reply {
                        Reply::Text(text) => TurnState::FinalResponseReady(text),
                        Reply::Call(call) if tool_calls.len() >= self.max_follow_ups => {
                            warn!("Refusing follow-up call to {} after {} tool calls", call.name, tool_calls.len());
                            TurnState::FinalResponseReady(follow_up_refusal(&call.name, self.max_follow_ups))
                        }
                        Reply::Call(call) => {
                            info!("Model requested tool {}", call.name);
                            self.history.push(Message::function_call(call.clone()));
                            TurnState::ToolExecuting(call)
                        }
                    }
                }

                TurnState::ToolExecuting(call) => {
                    tool_calls.push(call.name.clone());
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        r = self.dispatcher.execute_call(&call) => Some(r),
                    };

                    let Some(result) = result else {
                        info!("Tool {} interrupted", call.name);
                        let interrupted = ToolResult::error(INTERRUPTED_MESSAGE);
                        self.history.push(Message::function_result(
                            FunctionResult::from_tool_result(&call.name, &interrupted),
                        ));
                        return TurnOutcome::Interrupted;
                    };

                    let message =
                        Message::function_result(FunctionResult::from_tool_result(&call.name, &result));
                    self.history.push(message.clone());
                    TurnState::ModelRequested(message)
                }

                TurnState::FinalResponseReady(text) => {
                    self.history.push(Message::model(text.clone()));
                    return TurnOutcome::Response { text, tool_calls };
                }
            };
        }
    }

    /// Ask the model to summarise the conversation on a throwaway chat.
    /// History is not modified.
    pub async fn summarize(&self, context: Option<&str>) -> Result<String, CoreError> {
        let snapshot = self.history.snapshot();
        let condensed: Vec<String> = snapshot
            .iter()
            .map(|m| format!("{}: {}...", m.role, m.preview(100)))
            .collect();
        let context = context
            .map(|c| format!("Current Context: {}\n\n", c))
            .unwrap_or_default();
        let prompt = format!(
            "{}Summarize the following conversation history:\n\n{}\n\nSummary:",
            context,
            condensed.join("\n")
        );

        let mut chat = self.model.start_chat(&snapshot);
        let response = chat.send_message(&Message::user(prompt)).await?;
        Ok(response
            .candidates
            .first()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text(t) => Some(t.as_str()),
                        Part::FunctionCall(_) => None,
                    })
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

fn follow_up_refusal(tool: &str, limit: usize) -> String {
    format!(
        "The model asked to run '{}', but only {} tool call{} per message \
         {} allowed. Ask again to continue.",
        tool,
        limit,
        if limit == 1 { "" } else { "s" },
        if limit == 1 { "is" } else { "are" }
    )
}

/// Decide what the first part of the first candidate asks for.
fn read_reply(response: ModelResponse) -> Result<Reply, CoreError> {
    match response.first_part() {
        Some(Part::FunctionCall(call)) => return Ok(Reply::Call(call.clone())),
        Some(Part::Text(text)) if !text.trim().is_empty() => return Ok(Reply::Text(text.clone())),
        _ => {}
    }

    if let Some(reason) = &response.block_reason {
        let mut text = format!("Request blocked: {}", reason);
        if let Some(details) = &response.block_reason_message {
            text.push_str(&format!("\nDetails: {}", details));
        }
        return Ok(Reply::Text(text));
    }

    let Some(candidate) = response.candidates.first() else {
        return Err(CoreError::MalformedResponse("response has no candidates".into()));
    };

    match candidate.finish_reason.as_deref() {
        Some(reason) if reason != "STOP" => Ok(Reply::Text(format!(
            "Model stopped unexpectedly. Finish reason: {}",
            reason
        ))),
        _ => Err(CoreError::MalformedResponse(
            "candidate has no text or function call".into(),
        )),
    }
}

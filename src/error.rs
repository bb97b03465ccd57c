//! Error taxonomy for the orchestration core.

use thiserror::Error;

/// Failures surfaced by the registry, dispatcher, process runner and
/// conversation controller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// A tool handler returned an error.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution { name: String, message: String },

    /// A subprocess did not exit before its deadline and was killed.
    #[error("command timed out after {secs} seconds: {command}")]
    ProcessTimeout { command: String, secs: u64 },

    /// The executable for a subprocess could not be found.
    #[error("executable not found: {0}")]
    ProcessNotFound(String),

    /// The remote model was unreachable or returned a failure status.
    #[error("model request failed: {0}")]
    Transport(String),

    /// The model declined to answer.
    #[error("Request blocked: {0}")]
    SafetyBlocked(String),

    /// The model response did not have a recognisable shape.
    #[error("unexpected model response: {0}")]
    MalformedResponse(String),

    /// A tool name was registered twice.
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
}

impl CoreError {
    /// Whether the error originated from the remote model boundary.
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::SafetyBlocked(_) | Self::MalformedResponse(_)
        )
    }
}

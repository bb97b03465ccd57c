//! Routes a line of user input to a tool, a context change or the model.

use super::interpreter::{self, Interpretation, SessionContext};
use crate::tools::ToolRegistry;
use std::fmt;
use std::sync::Arc;

/// Which stage of the chain produced a tool intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Interpreter,
    Prefix,
    Intercept,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interpreter => write!(f, "interpreter"),
            Self::Prefix => write!(f, "prefix"),
            Self::Intercept => write!(f, "intercept"),
        }
    }
}

/// Outcome of resolving one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Tool {
        stage: Stage,
        name: String,
        args: String,
    },
    ChangeDirectory(String),
    /// Nothing local matched; send the text to the model.
    Model(String),
}

const INTERCEPTS: &[(&[&str], &str)] = &[
    (
        &["check system", "system info", "sys info", "show system info"],
        "sys_info",
    ),
    (&["git status"], "git_status"),
    (&["show processes", "ps"], "ps"),
];

/// Ordered resolution: interpreter, tool-name prefix, exact intercepts.
///
/// Every stage is pure; nothing here touches the filesystem or runs a tool.
#[derive(Debug, Clone)]
pub struct IntentChain {
    registry: Arc<ToolRegistry>,
}

impl IntentChain {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, input: &str, ctx: &SessionContext) -> Intent {
        let input = input.trim();

        if let Some(found) = interpreter::interpret(input, ctx) {
            return match found {
                Interpretation::Tool { name, args } => Intent::Tool {
                    stage: Stage::Interpreter,
                    name,
                    args,
                },
                Interpretation::ChangeDirectory(dir) => Intent::ChangeDirectory(dir),
            };
        }

        if let Some((name, args)) = self.prefix_match(input) {
            return Intent::Tool {
                stage: Stage::Prefix,
                name,
                args,
            };
        }

        if let Some(name) = intercept(input) {
            return Intent::Tool {
                stage: Stage::Intercept,
                name: name.to_string(),
                args: String::new(),
            };
        }

        Intent::Model(input.to_string())
    }

    /// `<tool> <args>`: the first token names a tool and a space follows it.
    fn prefix_match(&self, input: &str) -> Option<(String, String)> {
        let (head, rest) = input.split_once(' ')?;
        let descriptor = self.registry.lookup_ignore_case(head)?;
        Some((descriptor.name.clone(), rest.trim().to_string()))
    }
}

fn intercept(input: &str) -> Option<&'static str> {
    let lowered = input.to_lowercase();
    INTERCEPTS
        .iter()
        .find(|(phrases, _)| phrases.contains(&lowered.as_str()))
        .map(|(_, tool)| *tool)
}

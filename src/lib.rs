//! Gemini Terminal: an interactive command-line assistant.
//!
//! User input is routed to one of three handlers: a pattern-based
//! natural-language interpreter, a direct tool invocation, or a remote
//! Gemini model that may itself request a tool call.

pub mod agent;
pub mod config;
pub mod error;
pub mod intent;
pub mod model;
pub mod process;
pub mod repl;
pub mod tools;
pub mod types;
pub mod ui;

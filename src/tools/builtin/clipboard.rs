//! `clipboard`: copy text to, or read text from, the system clipboard.

use crate::tools::args::rest_arg;
use crate::tools::traits::{Tool, ToolContext};
use crate::types::{truncate_chars, ToolResult};
use anyhow::{anyhow, Context, Result};
use arboard::Clipboard;
use async_trait::async_trait;
use tracing::debug;

const PREVIEW_CHARS: usize = 80;

pub struct ClipboardTool;

#[async_trait]
impl Tool for ClipboardTool {
    fn name(&self) -> &str {
        "clipboard"
    }

    fn description(&self) -> &str {
        "Access clipboard contents (copy/paste)."
    }

    fn usage(&self) -> &str {
        "clipboard [text_to_copy]"
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let text = rest_arg(args);
        let action = if text.is_empty() {
            ClipboardAction::Paste
        } else {
            ClipboardAction::Copy(text)
        };
        tokio::task::spawn_blocking(move || action.run())
            .await
            .context("Clipboard task failed")?
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClipboardAction {
    Copy(String),
    Paste,
}

impl ClipboardAction {
    fn run(self) -> Result<ToolResult> {
        let mut clipboard = Clipboard::new().map_err(unavailable)?;
        match self {
            ClipboardAction::Copy(text) => {
                clipboard.set_text(text.clone()).map_err(unavailable)?;
                debug!("Copied {} chars to the clipboard", text.chars().count());
                Ok(ToolResult::text(copied_message(&text)))
            }
            ClipboardAction::Paste => match clipboard.get_text() {
                Ok(content) if !content.is_empty() => Ok(ToolResult::text(content)),
                Ok(_) | Err(arboard::Error::ContentNotAvailable) => {
                    Ok(ToolResult::text("Clipboard is empty."))
                }
                Err(e) => Err(unavailable(e)),
            },
        }
    }
}

fn unavailable(err: arboard::Error) -> anyhow::Error {
    anyhow!(
        "Error accessing clipboard: {}. (Is a display environment available?)",
        err
    )
}

fn copied_message(text: &str) -> String {
    format!("Copied to clipboard:\n'{}'", truncate_chars(text, PREVIEW_CHARS))
}

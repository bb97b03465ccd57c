//! `diff`: unified diff of two files or two literal texts.

use crate::tools::args::{rest_arg, take_arg};
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use similar::TextDiff;
use std::path::Path;

pub struct DiffTool;

#[async_trait]
impl Tool for DiffTool {
    fn name(&self) -> &str {
        "diff"
    }

    fn description(&self) -> &str {
        "Compare two files or texts (unified diff)."
    }

    fn usage(&self) -> &str {
        "diff <file1_or_text1> <file2_or_text2>"
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let (first, rest) = take_arg(args).unwrap_or_default();
        let second = rest_arg(rest);
        if first.is_empty() || second.is_empty() {
            bail!("Usage: diff <file1_or_text1> <file2_or_text2>");
        }

        let (old, old_label) = load_source(&first).await?;
        let (new, new_label) = load_source(&second).await?;

        let rendered = unified_diff(&old, &new, &old_label, &new_label);
        if rendered.is_empty() {
            return Ok(ToolResult::text(format!(
                "No differences found between '{}' and '{}'.",
                old_label, new_label
            )));
        }
        Ok(ToolResult::text(rendered))
    }
}

/// File contents when `source` names a regular file, else the text itself.
async fn load_source(source: &str) -> Result<(String, String)> {
    let path = Path::new(source);
    if path.is_file() {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Error reading {}", path.display()))?;
        Ok((String::from_utf8_lossy(&bytes).into_owned(), path.display().to_string()))
    } else {
        Ok((source.to_string(), source.to_string()))
    }
}

fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .missing_newline_hint(false)
        .header(old_label, new_label)
        .to_string()
}

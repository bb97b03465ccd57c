//! `open`: hand a file or URL to the platform opener.

use super::walk_files;
use crate::tools::args::rest_arg;
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

const OPEN_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SUGGESTIONS: usize = 10;

pub struct OpenTool;

#[async_trait]
impl Tool for OpenTool {
    fn name(&self) -> &str {
        "open"
    }

    fn description(&self) -> &str {
        "Open a file or URL with the default application."
    }

    fn usage(&self) -> &str {
        "open <path_or_url>"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let target = rest_arg(args);
        if target.is_empty() {
            bail!("Missing file path or URL to open.");
        }

        let is_url = ["http://", "https://", "file://"]
            .iter()
            .any(|scheme| target.starts_with(scheme));

        if !is_url && !Path::new(&target).exists() {
            let needle = target.clone();
            let similar = tokio::task::spawn_blocking(move || find_similar(&needle, Path::new(".")))
                .await
                .unwrap_or_default();
            if similar.is_empty() {
                bail!("File or directory not found: {}", target);
            }
            let list = similar
                .iter()
                .map(|p| format!("  - {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n");
            bail!("File not found: '{}'. Did you mean one of these?\n{}", target, list);
        }

        let output = if cfg!(target_os = "windows") {
            ctx.runner
                .run("cmd", &["/C", "start", "", target.as_str()], OPEN_TIMEOUT, None)
                .await?
        } else if cfg!(target_os = "macos") {
            ctx.runner.run("open", &[target.as_str()], OPEN_TIMEOUT, None).await?
        } else {
            ctx.runner.run("xdg-open", &[target.as_str()], OPEN_TIMEOUT, None).await?
        };

        if !output.success() {
            bail!("Error opening '{}': {}", target, output.stderr.trim());
        }
        Ok(ToolResult::text(format!("Attempted to open '{}'.", target)))
    }
}

/// Files below `root` whose name contains the requested file name.
fn find_similar(target: &str, root: &Path) -> Vec<PathBuf> {
    let wanted = Path::new(target)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| target.to_lowercase());
    let mut found = Vec::new();
    walk_files(root, &mut |path, _| {
        let matches = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase().contains(&wanted))
            .unwrap_or(false);
        if matches {
            found.push(path.to_path_buf());
        }
        found.len() < MAX_SUGGESTIONS
    });
    found
}

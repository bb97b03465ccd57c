//! `lint`: run flake8 and tabulate its findings.

use crate::tools::args::rest_arg;
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LINT_TIMEOUT: Duration = Duration::from_secs(60);

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]+\d+)\b").expect("valid regex"));

pub struct LintTool;

#[async_trait]
impl Tool for LintTool {
    fn name(&self) -> &str {
        "lint"
    }

    fn description(&self) -> &str {
        "Run code linters (flake8 for Python) on a file or directory."
    }

    fn usage(&self) -> &str {
        "lint [path]"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let arg = rest_arg(args);
        let path = if arg.is_empty() {
            std::env::current_dir().context("Cannot determine current directory")?
        } else {
            PathBuf::from(arg)
        };

        if !path.exists() {
            bail!("Path not found: {}", path.display());
        }
        let is_python = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("py"))
            .unwrap_or(false);
        if path.is_file() && !is_python {
            return Ok(ToolResult::text(
                "Warning: Lint tool is optimized for Python files. Results may vary for other file types.",
            ));
        }

        let target = path.display().to_string();
        let out = ctx
            .runner
            .run("flake8", &[target.as_str()], LINT_TIMEOUT, None)
            .await
            .map_err(|e| match e {
                crate::process::ProcessError::NotFound { .. } => anyhow::anyhow!(
                    "flake8 not found. Make sure flake8 is installed and in your PATH (pip install flake8)."
                ),
                other => other.into(),
            })?;

        let findings = out.stdout.trim();
        if findings.is_empty() {
            if out.success() {
                return Ok(ToolResult::text(format!(
                    "Linting passed for '{}'. No issues found.",
                    target
                )));
            }
            bail!("Error running linter: {}", out.stderr.trim());
        }

        // flake8 exits 1 when it reports findings.
        Ok(ToolResult::Tabular {
            title: format!("Linting Issues for '{}'", target),
            headers: ["Location", "Code", "Message"].map(String::from).to_vec(),
            rows: findings.lines().map(parse_finding).collect(),
        })
    }
}

/// `file:line:col: CODE message` → [location, code, message].
fn parse_finding(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.splitn(4, ':').collect();
    let [loc, lnum, cnum, msg] = parts.as_slice() else {
        return vec!["N/A".into(), "N/A".into(), line.to_string()];
    };
    let file = Path::new(loc)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| loc.to_string());
    let code = CODE_RE
        .captures(msg)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "N/A".into());
    vec![format!("{}:{}:{}", file, lnum, cnum), code, msg.trim().to_string()]
}

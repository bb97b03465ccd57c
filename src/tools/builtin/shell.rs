//! Command and code execution tools.

use crate::process::{ProcessError, ProcessOutput};
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

const SHELL_TIMEOUT: Duration = Duration::from_secs(60);
const CODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Commands that must never run, whatever the model asks for.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "rm -rf ~/.gemini-terminal",
    ":(){ :|:& };:",
    "mkfs",
    "dd if=",
    "shutdown",
    "reboot",
    "> /dev/sda",
];

/// Check if a command string matches a forbidden pattern.
fn is_forbidden(command: &str) -> bool {
    let lower = command.to_lowercase();
    FORBIDDEN_PATTERNS.iter().any(|pat| {
        let pat = pat.to_lowercase();
        match lower.find(&pat) {
            // "rm -rf /" must not reject "rm -rf /tmp/x".
            Some(idx) if pat.ends_with('/') || pat.ends_with('~') => lower[idx + pat.len()..]
                .chars()
                .next()
                .map_or(true, |c| c.is_whitespace() || c == ';' || c == '*'),
            Some(_) => true,
            None => false,
        }
    })
}

fn ensure_execution_allowed(ctx: &ToolContext, tool: &str) -> Result<()> {
    if !ctx.allow_execution {
        bail!(
            "{} is disabled. Set allow_execution = true in the config to enable it.",
            tool
        );
    }
    Ok(())
}

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute shell commands. Use with caution."
    }

    fn usage(&self) -> &str {
        "shell <command>"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let command = args.trim();
        if command.is_empty() {
            bail!("No command provided to shell.");
        }
        ensure_execution_allowed(ctx, "Shell execution")?;
        if is_forbidden(command) {
            bail!("Forbidden command blocked: {}", command);
        }

        info!("Running shell command: {}", command);
        let output = ctx.runner.run_shell(command, SHELL_TIMEOUT, None).await?;
        Ok(ToolResult::text(format_shell_output(&output)))
    }
}

fn format_shell_output(output: &ProcessOutput) -> String {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();

    if stdout.is_empty() && stderr.is_empty() && output.success() {
        return "Command executed successfully (no output).".to_string();
    }

    let mut text = String::new();
    if !stdout.is_empty() {
        text.push_str("Output:\n");
        text.push_str(stdout);
        text.push('\n');
    }
    if !stderr.is_empty() {
        text.push_str("Errors:\n");
        text.push_str(stderr);
        text.push('\n');
    }
    if !output.success() {
        text.push_str(&format!("Command exited with status {}", output.exit_code));
    }
    text.trim_end().to_string()
}

pub struct ExecuteCodeTool;

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute Python code snippet. Use with caution."
    }

    fn usage(&self) -> &str {
        "execute_code <python_code>"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source to run"
                }
            },
            "required": ["code"]
        }))
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        if args.trim().is_empty() {
            bail!("Usage: execute_code <python_code>");
        }
        ensure_execution_allowed(ctx, "Code execution")?;

        let script = std::env::temp_dir().join(format!("gemini-terminal-{}.py", ulid::Ulid::new()));
        tokio::fs::write(&script, args)
            .await
            .with_context(|| format!("Cannot write {}", script.display()))?;
        let script_arg = script.display().to_string();

        let mut result = ctx
            .runner
            .run("python3", &[&script_arg], CODE_TIMEOUT, None)
            .await;
        if matches!(result, Err(ProcessError::NotFound { .. })) {
            result = ctx.runner.run("python", &[&script_arg], CODE_TIMEOUT, None).await;
        }

        if let Err(e) = tokio::fs::remove_file(&script).await {
            warn!("Failed to remove {}: {}", script.display(), e);
        }

        let output = result?;
        Ok(ToolResult::structured([
            ("stdout", output.stdout),
            ("stderr", output.stderr),
            ("returncode", output.exit_code.to_string()),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_patterns() {
        assert!(is_forbidden("sudo rm -rf / --no-preserve-root"));
        assert!(is_forbidden("RM -RF /"));
        assert!(is_forbidden("mkfs.ext4 /dev/sdb1"));
        assert!(!is_forbidden("rm -rf /tmp/scratch"));
        assert!(!is_forbidden("ls -la"));
    }

    #[test]
    fn output_formatting() {
        let quiet = ProcessOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(
            format_shell_output(&quiet),
            "Command executed successfully (no output)."
        );

        let failed = ProcessOutput {
            exit_code: 2,
            stdout: "partial\n".into(),
            stderr: "bad flag\n".into(),
        };
        assert_eq!(
            format_shell_output(&failed),
            "Output:\npartial\nErrors:\nbad flag\nCommand exited with status 2"
        );
    }

    #[tokio::test]
    async fn refused_when_execution_disabled() {
        let ctx = ToolContext {
            allow_execution: false,
            ..ToolContext::default()
        };
        let err = ShellTool.execute(&ctx, "echo hi").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
        assert!(ExecuteCodeTool.execute(&ctx, "print(1)").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_shell_commands() {
        let out = ShellTool
            .execute(&ToolContext::default(), "echo hello")
            .await
            .unwrap();
        assert_eq!(out, ToolResult::text("Output:\nhello"));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        assert!(ShellTool.execute(&ToolContext::default(), "  ").await.is_err());
    }
}

//! `pip`: list, install and uninstall Python packages.

use crate::process::ProcessOutput;
use crate::tools::args::{rest_arg, take_arg};
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PipCommand {
    List,
    Install(String),
    Uninstall(String),
}

impl PipCommand {
    fn parse(args: &str) -> Result<Self> {
        let Some((op, rest)) = take_arg(args) else {
            bail!("Usage: pip list | install <pkg> | uninstall <pkg>");
        };
        let package = rest_arg(rest).trim().to_string();
        match op.to_lowercase().as_str() {
            "list" => Ok(Self::List),
            "install" if package.is_empty() => bail!("Usage: pip install <package_name>"),
            "install" => Ok(Self::Install(package)),
            "uninstall" if package.is_empty() => bail!("Usage: pip uninstall <package_name>"),
            "uninstall" => Ok(Self::Uninstall(package)),
            other => bail!(
                "Unknown pip operation '{}'. Use list|install|uninstall.",
                other
            ),
        }
    }

    fn args(&self) -> Vec<&str> {
        match self {
            Self::List => vec!["-m", "pip", "list"],
            Self::Install(pkg) => vec!["-m", "pip", "install", pkg],
            Self::Uninstall(pkg) => vec!["-m", "pip", "uninstall", "-y", pkg],
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            Self::List => Duration::from_secs(30),
            Self::Install(_) => Duration::from_secs(180),
            Self::Uninstall(_) => Duration::from_secs(60),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::List => "listing packages".to_string(),
            Self::Install(pkg) => format!("installing '{}'", pkg),
            Self::Uninstall(pkg) => format!("uninstalling '{}'", pkg),
        }
    }
}

pub struct PipTool;

#[async_trait]
impl Tool for PipTool {
    fn name(&self) -> &str {
        "pip"
    }

    fn description(&self) -> &str {
        "Manage Python packages (install/list/uninstall)."
    }

    fn usage(&self) -> &str {
        "pip install|list|uninstall <package_name>"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let command = PipCommand::parse(args)?;
        if !matches!(command, PipCommand::List) && !ctx.allow_execution {
            bail!("Package changes are disabled. Set allow_execution = true in the config to enable them.");
        }

        info!("Running pip {}", command.describe());
        let output = ctx
            .runner
            .run("python3", &command.args(), command.timeout(), None)
            .await?;
        Ok(ToolResult::text(format_pip_output(&command, &output)))
    }
}

fn format_pip_output(command: &PipCommand, output: &ProcessOutput) -> String {
    let mut text = format!("Pip {}:\n", command.describe());
    if !output.stdout.trim().is_empty() {
        text.push_str(&format!("\nOutput:\n{}\n", output.stdout.trim()));
    }
    if !output.stderr.trim().is_empty() {
        text.push_str(&format!("\nErrors/Warnings:\n{}\n", output.stderr.trim()));
    }
    if !output.success() {
        text.push_str(&format!(
            "\nPip command failed with exit code {}.",
            output.exit_code
        ));
    }
    text.trim_end().to_string()
}

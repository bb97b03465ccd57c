//! Network tools: `ping` and `curl`.

use crate::tools::args::rest_arg;
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

const PING_TIMEOUT: Duration = Duration::from_secs(10);
const CURL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PingTool;

#[async_trait]
impl Tool for PingTool {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Ping a network host."
    }

    fn usage(&self) -> &str {
        "ping <host>"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let host = rest_arg(args);
        if host.is_empty() {
            bail!("No host provided to ping.");
        }
        if host.starts_with('-') {
            bail!("Invalid host: {}", host);
        }

        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        let out = ctx
            .runner
            .run("ping", &[count_flag, "4", host.as_str()], PING_TIMEOUT, None)
            .await?;

        // A failed ping is a result, not a tool failure.
        let mut text = format!("Ping Results for {}:\n\n{}", host, out.stdout.trim());
        if !out.stderr.trim().is_empty() {
            text.push_str(&format!("\n\nErrors:\n{}", out.stderr.trim()));
        }
        Ok(ToolResult::text(text))
    }
}

pub struct CurlTool;

#[async_trait]
impl Tool for CurlTool {
    fn name(&self) -> &str {
        "curl"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL using the curl command."
    }

    fn usage(&self) -> &str {
        "curl <url>"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let url = rest_arg(args);
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("Invalid or missing URL. Must start with http:// or https://");
        }

        let out = ctx
            .runner
            .run("curl", &["-s", "-S", "-L", url.as_str()], CURL_TIMEOUT, None)
            .await?;
        if !out.success() {
            let reason = out.stderr.trim();
            bail!(
                "Error fetching URL with curl: {}",
                if reason.is_empty() { "Unknown error" } else { reason }
            );
        }
        Ok(ToolResult::text(out.stdout))
    }
}

//! Host inspection tools: system info, date/time and process listing.
//!
//! Figures are gathered best-effort from `/proc`, `df` and `uname`; any
//! field that cannot be read is reported as `N/A` rather than failing the
//! whole call.

use super::format_size;
use crate::process::ProcessRunner;
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use std::collections::HashMap;
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const PS_TIMEOUT: Duration = Duration::from_secs(15);
const PS_LIMIT: usize = 50;
const NA: &str = "N/A";

// ---------------------------------------------------------------------------
// System snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the host.
#[derive(Debug, Clone, Default)]
struct SystemSnapshot {
    os: String,
    release: Option<String>,
    arch: String,
    hostname: Option<String>,
    logical_cpus: Option<usize>,
    load_average: Option<String>,
    mem_total_kb: Option<u64>,
    mem_available_kb: Option<u64>,
    disk_total_kb: Option<u64>,
    disk_used_kb: Option<u64>,
    boot_time: Option<i64>,
}

impl SystemSnapshot {
    async fn collect(runner: &ProcessRunner) -> Self {
        let meminfo = read_proc("/proc/meminfo").await;
        let (mem_total_kb, mem_available_kb) = meminfo
            .as_deref()
            .map(parse_meminfo)
            .unwrap_or((None, None));

        let disk = match runner.run("df", &["-Pk", "/"], QUERY_TIMEOUT, None).await {
            Ok(out) if out.success() => parse_df(&out.stdout),
            _ => None,
        };

        let release = match read_proc("/proc/sys/kernel/osrelease").await {
            Some(r) => Some(r),
            None => uname(runner, "-r").await,
        };
        let hostname = match read_proc("/proc/sys/kernel/hostname").await {
            Some(h) => Some(h),
            None => uname(runner, "-n").await,
        };

        Self {
            os: std::env::consts::OS.to_string(),
            release,
            arch: std::env::consts::ARCH.to_string(),
            hostname,
            logical_cpus: std::thread::available_parallelism().ok().map(|n| n.get()),
            load_average: read_proc("/proc/loadavg").await.map(|l| {
                l.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
            }),
            mem_total_kb,
            mem_available_kb,
            disk_total_kb: disk.map(|(total, _)| total),
            disk_used_kb: disk.map(|(_, used)| used),
            boot_time: read_proc("/proc/stat").await.as_deref().and_then(parse_btime),
        }
    }

    fn system(&self) -> String {
        match &self.release {
            Some(release) => format!("{} {}", self.os, release),
            None => self.os.clone(),
        }
    }

    fn ram_used_percent(&self) -> Option<String> {
        let total = self.mem_total_kb.filter(|t| *t > 0)?;
        let available = self.mem_available_kb?;
        let used = total.saturating_sub(available);
        Some(format!("{:.1}%", used as f64 * 100.0 / total as f64))
    }

    fn disk_used(&self) -> Option<String> {
        let total = self.disk_total_kb.filter(|t| *t > 0)?;
        let used = self.disk_used_kb?;
        Some(format!(
            "{} ({:.1}%)",
            format_size(used * 1024),
            used as f64 * 100.0 / total as f64
        ))
    }

    fn boot_time_display(&self) -> Option<String> {
        let secs = self.boot_time?;
        Local
            .timestamp_opt(secs, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
    }

    /// (display label, stats key, value) rows.
    fn rows(&self) -> Vec<(&'static str, &'static str, String)> {
        let kb = |v: Option<u64>| v.map(|k| format_size(k * 1024));
        vec![
            ("System", "system", self.system()),
            ("Architecture", "architecture", self.arch.clone()),
            ("Hostname", "hostname", or_na(self.hostname.clone())),
            (
                "CPU Cores",
                "cpu_cores",
                or_na(self.logical_cpus.map(|n| format!("{} logical", n))),
            ),
            ("Load Average", "load_average", or_na(self.load_average.clone())),
            ("RAM Total", "ram_total", or_na(kb(self.mem_total_kb))),
            ("RAM Available", "ram_available", or_na(kb(self.mem_available_kb))),
            ("RAM Used", "ram_used", or_na(self.ram_used_percent())),
            ("Disk Total", "disk_total", or_na(kb(self.disk_total_kb))),
            ("Disk Used", "disk_used", or_na(self.disk_used())),
            ("Boot Time", "boot_time", or_na(self.boot_time_display())),
        ]
    }
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NA.to_string())
}

async fn read_proc(path: &str) -> Option<String> {
    tokio::fs::read_to_string(path)
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

async fn uname(runner: &ProcessRunner, flag: &str) -> Option<String> {
    match runner.run("uname", &[flag], QUERY_TIMEOUT, None).await {
        Ok(out) if out.success() => Some(out.stdout.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// `MemTotal` and `MemAvailable` in kB.
fn parse_meminfo(text: &str) -> (Option<u64>, Option<u64>) {
    let field = |name: &str| {
        text.lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse().ok())
    };
    (field("MemTotal:"), field("MemAvailable:"))
}

/// Total and used kB from `df -Pk` output.
fn parse_df(text: &str) -> Option<(u64, u64)> {
    let line = text.lines().nth(1)?;
    let cols: Vec<&str> = line.split_whitespace().collect();
    let total = cols.get(1)?.parse().ok()?;
    let used = cols.get(2)?.parse().ok()?;
    Some((total, used))
}

fn parse_btime(stat: &str) -> Option<i64> {
    stat.lines()
        .find_map(|l| l.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

pub struct SysInfoTool;

#[async_trait]
impl Tool for SysInfoTool {
    fn name(&self) -> &str {
        "sys_info"
    }

    fn description(&self) -> &str {
        "Get detailed system information."
    }

    fn usage(&self) -> &str {
        "sys_info"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }

    async fn execute(&self, ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        let snapshot = SystemSnapshot::collect(&ctx.runner).await;
        Ok(ToolResult::structured(
            snapshot.rows().into_iter().map(|(label, _, v)| (label, v)),
        ))
    }
}

pub struct SystemStatsTool;

#[async_trait]
impl Tool for SystemStatsTool {
    fn name(&self) -> &str {
        "get_system_stats"
    }

    fn description(&self) -> &str {
        "Get system statistics like CPU and memory usage."
    }

    fn usage(&self) -> &str {
        "get_system_stats"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }

    async fn execute(&self, ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        let snapshot = SystemSnapshot::collect(&ctx.runner).await;
        Ok(ToolResult::structured(
            snapshot.rows().into_iter().map(|(_, key, v)| (key, v)),
        ))
    }
}

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "get_current_datetime"
    }

    fn description(&self) -> &str {
        "Get the current date and time."
    }

    fn usage(&self) -> &str {
        "get_current_datetime"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }

    async fn execute(&self, _ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        let now = Local::now();
        Ok(ToolResult::structured([
            ("current_datetime", now.to_rfc3339()),
            ("timezone", now.format("%:z").to_string()),
        ]))
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct ProcessRow {
    pid: u32,
    user: String,
    cpu: f64,
    mem: f64,
    name: String,
    cmdline: String,
}

/// First `n - 1` whitespace-separated columns, then the rest of the line
/// as one column.
fn split_columns(line: &str, n: usize) -> Option<Vec<&str>> {
    let mut cols = Vec::with_capacity(n);
    let mut rest = line.trim();
    while cols.len() + 1 < n {
        let (col, tail) = rest.split_once(char::is_whitespace)?;
        cols.push(col);
        rest = tail.trim_start();
    }
    if rest.is_empty() {
        return None;
    }
    cols.push(rest);
    Some(cols)
}

/// `pid=,comm=` output keyed by pid. Names may contain spaces.
fn parse_names(text: &str) -> HashMap<u32, String> {
    text.lines()
        .filter_map(|line| {
            let cols = split_columns(line, 2)?;
            Some((cols[0].parse().ok()?, cols[1].to_string()))
        })
        .collect()
}

/// Parse `pid=,user=,pcpu=,pmem=,args=` output, heaviest memory users
/// first. Names come from `names`, falling back to the executable's file
/// name.
fn parse_ps(text: &str, names: &HashMap<u32, String>) -> Vec<ProcessRow> {
    let mut rows: Vec<ProcessRow> = text
        .lines()
        .filter_map(|line| {
            let cols = split_columns(line, 5)?;
            let pid = cols[0].parse().ok()?;
            let cmdline = cols[4].to_string();
            let name = names.get(&pid).cloned().unwrap_or_else(|| {
                let exe = cmdline.split_whitespace().next().unwrap_or_default();
                exe.rsplit('/').next().unwrap_or(exe).to_string()
            });
            Some(ProcessRow {
                pid,
                user: cols[1].to_string(),
                cpu: cols[2].parse().ok()?,
                mem: cols[3].parse().ok()?,
                name,
                cmdline,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.mem.total_cmp(&a.mem));
    rows
}

async fn run_ps(runner: &ProcessRunner, format: &str) -> Result<String> {
    let out = runner.run("ps", &["-A", "-o", format], PS_TIMEOUT, None).await?;
    if !out.success() {
        bail!("Error getting process list: {}", out.stderr.trim());
    }
    Ok(out.stdout)
}

async fn snapshot_processes(runner: &ProcessRunner) -> Result<Vec<ProcessRow>> {
    if cfg!(windows) {
        bail!("Process listing is not supported on this platform.");
    }
    let usage = run_ps(runner, "pid=,user=,pcpu=,pmem=,args=").await?;
    let names = parse_names(&run_ps(runner, "pid=,comm=").await?);
    let mut rows = parse_ps(&usage, &names);
    rows.truncate(PS_LIMIT);
    Ok(rows)
}

pub struct PsTool;

#[async_trait]
impl Tool for PsTool {
    fn name(&self) -> &str {
        "ps"
    }

    fn description(&self) -> &str {
        "List running processes."
    }

    fn usage(&self) -> &str {
        "ps"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }

    async fn execute(&self, ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        let rows = snapshot_processes(&ctx.runner).await?;
        if rows.is_empty() {
            return Ok(ToolResult::text("No processes found (or unable to list any)."));
        }
        Ok(ToolResult::Tabular {
            title: "Running Processes".into(),
            headers: ["PID", "User", "CPU %", "MEM%", "Name", "Command Line"]
                .map(String::from)
                .to_vec(),
            rows: rows
                .into_iter()
                .map(|p| {
                    vec![
                        p.pid.to_string(),
                        p.user,
                        format!("{:.1}", p.cpu),
                        format!("{:.1}", p.mem),
                        p.name,
                        p.cmdline,
                    ]
                })
                .collect(),
        })
    }
}

pub struct ListProcessesTool;

#[async_trait]
impl Tool for ListProcessesTool {
    fn name(&self) -> &str {
        "list_processes"
    }

    fn description(&self) -> &str {
        "List running processes."
    }

    fn usage(&self) -> &str {
        "list_processes"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }

    async fn execute(&self, ctx: &ToolContext, _args: &str) -> Result<ToolResult> {
        let rows = snapshot_processes(&ctx.runner).await?;
        Ok(ToolResult::Tabular {
            title: String::new(),
            headers: ["pid", "name", "cpu_percent", "memory_percent"]
                .map(String::from)
                .to_vec(),
            rows: rows
                .into_iter()
                .map(|p| {
                    vec![
                        p.pid.to_string(),
                        p.name,
                        format!("{:.1}", p.cpu),
                        format!("{:.1}", p.mem),
                    ]
                })
                .collect(),
        })
    }
}

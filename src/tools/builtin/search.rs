//! `search_files`: match file names and text content below a directory.

use super::{relative_display, walk_files};
use crate::tools::args::{rest_arg, take_arg};
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

const MATCH_LIMIT: usize = 50;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "js", "html", "css", "json", "xml", "yml", "yaml", "sh", "rs", "toml",
];

pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search for files by name or content."
    }

    fn usage(&self) -> &str {
        "search_files <query> [path]"
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let Some((query, rest)) = take_arg(args) else {
            bail!("Usage: search_files <query> [directory_path]");
        };
        let dir = rest_arg(rest);
        let dir = if dir.is_empty() { ".".to_string() } else { dir };
        search_tree(query, PathBuf::from(dir)).await
    }
}

/// Name and content search shared with `file search`.
pub(crate) async fn search_tree(query: String, dir: PathBuf) -> Result<ToolResult> {
    if query.is_empty() {
        bail!("Search query must not be empty");
    }
    if !dir.is_dir() {
        bail!("Search path is not a valid directory: {}", dir.display());
    }

    let pattern = NamePattern::new(&query)?;
    let report = tokio::task::spawn_blocking(move || {
        let (names, contents) = collect_matches(&query, &pattern, &dir);
        render_report(&query, &dir, &names, &contents)
    })
    .await
    .context("Search task failed")?;

    Ok(ToolResult::text(report))
}

/// File-name matcher. `*` and `?` act as glob wildcards; anything else is
/// a plain substring. Either way the match may start and end anywhere in
/// the name.
#[derive(Debug)]
enum NamePattern {
    Substring(String),
    Glob(Regex),
}

impl NamePattern {
    fn new(query: &str) -> Result<Self> {
        if !query.contains(['*', '?']) {
            return Ok(Self::Substring(query.to_string()));
        }
        let mut source = String::with_capacity(query.len() * 2);
        for c in query.chars() {
            match c {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        let re = Regex::new(&source)
            .with_context(|| format!("Invalid search pattern '{}'", query))?;
        Ok(Self::Glob(re))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Substring(s) => name.contains(s.as_str()),
            Self::Glob(re) => re.is_match(name),
        }
    }
}

fn collect_matches(query: &str, pattern: &NamePattern, dir: &Path) -> (Vec<String>, Vec<String>) {
    let mut names = Vec::new();
    walk_files(dir, &mut |path, _| {
        let hit = path
            .file_name()
            .map(|n| pattern.matches(&n.to_string_lossy()))
            .unwrap_or(false);
        if hit {
            names.push(relative_display(path, dir));
        }
        names.len() < MATCH_LIMIT
    });
    if names.len() >= MATCH_LIMIT {
        names.push(format!("... (stopped after {} name matches)", MATCH_LIMIT));
    }

    let mut contents = Vec::new();
    walk_files(dir, &mut |path, _| {
        let is_text = path
            .extension()
            .map(|e| {
                let ext = e.to_string_lossy().to_lowercase();
                TEXT_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);
        if is_text {
            if let Ok(bytes) = std::fs::read(path) {
                if String::from_utf8_lossy(&bytes).contains(query) {
                    contents.push(relative_display(path, dir));
                }
            }
        }
        contents.len() < MATCH_LIMIT
    });
    if contents.len() >= MATCH_LIMIT {
        contents.push(format!("... (stopped after {} content matches)", MATCH_LIMIT));
    }

    (names, contents)
}

fn render_report(query: &str, dir: &Path, names: &[String], contents: &[String]) -> String {
    let mut out = vec![format!(
        "Search results for '{}' in '{}':",
        query,
        dir.display()
    )];
    if !names.is_empty() {
        out.push("\nFiles matching name:".to_string());
        out.extend(names.iter().map(|m| format!("  - {}", m)));
    }
    if !contents.is_empty() {
        out.push("\nFiles matching content:".to_string());
        out.extend(contents.iter().map(|m| format!("  - {}", m)));
    }
    if names.is_empty() && contents.is_empty() {
        out.push("\nNo matches found.".to_string());
    }
    out.join("\n")
}

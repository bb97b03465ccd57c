//! File tools: `file`, `list_files` and `read_file_content`.

use super::format_size;
use super::search::search_tree;
use crate::tools::args::{rest_arg, take_arg};
use crate::tools::traits::{Tool, ToolContext};
use crate::types::{ToolResult, TreeNode};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const FILE_USAGE: &str = "file read|write|list|search <path> [content_to_write|search_pattern]";

pub struct FileTool;

#[async_trait]
impl Tool for FileTool {
    fn name(&self) -> &str {
        "file"
    }

    fn description(&self) -> &str {
        "Read, write/overwrite, list directories, and search within files."
    }

    fn usage(&self) -> &str {
        FILE_USAGE
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let Some((operation, rest)) = take_arg(args) else {
            bail!("Usage: {}", FILE_USAGE);
        };

        match operation.to_lowercase().as_str() {
            "read" => {
                let path = rest_arg(rest);
                if path.is_empty() {
                    bail!("Usage: file read <path>");
                }
                let content = read_text(Path::new(&path)).await?;
                Ok(ToolResult::text(content))
            }
            "write" => {
                let (path, content) = take_arg(rest)
                    .map(|(p, tail)| (p, rest_arg(tail)))
                    .ok_or_else(|| anyhow!("Usage: file write <path> <content>"))?;
                write_text(Path::new(&path), &content).await
            }
            "list" => {
                let dir = rest_arg(rest);
                let dir = if dir.is_empty() {
                    std::env::current_dir().context("Cannot determine current directory")?
                } else {
                    PathBuf::from(dir)
                };
                list_tree(&dir).await
            }
            "search" => {
                let (query, tail) = take_arg(rest)
                    .ok_or_else(|| anyhow!("Usage: file search <query> <directory_path>"))?;
                let dir = rest_arg(tail);
                let dir = if dir.is_empty() { ".".to_string() } else { dir };
                search_tree(query, PathBuf::from(dir)).await
            }
            other => bail!(
                "Unknown file operation '{}'. Use read|write|list|search.",
                other
            ),
        }
    }
}

async fn read_text(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!(
            "File not found or is not a regular file: {}",
            path.display()
        );
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Error reading file {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn write_text(path: &Path, content: &str) -> Result<ToolResult> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Error writing to file {}", path.display()))?;
    Ok(ToolResult::text(format!(
        "Content ({} chars) written to {}",
        content.chars().count(),
        path.display()
    )))
}

async fn list_tree(dir: &Path) -> Result<ToolResult> {
    if !dir.is_dir() {
        bail!(
            "Directory not found or is not a directory: {}",
            dir.display()
        );
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Error listing directory {}", dir.display()))?;

    // (is_file, lowercase name, label) so directories sort first.
    let mut items: Vec<(bool, String, String)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let label = match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_dir() => {
                items.push((false, name.to_lowercase(), format!("{}/", name)));
                continue;
            }
            Ok(meta) => format!("{} ({})", name, format_size(meta.len())),
            Err(_) => format!("{} (broken link?)", name),
        };
        items.push((true, name.to_lowercase(), label));
    }
    items.sort();

    let mut root = TreeNode::new(dir.display().to_string());
    for (_, _, label) in items {
        root.push(TreeNode::new(label));
    }
    Ok(ToolResult::Tree { root })
}

// ---------------------------------------------------------------------------
// Model-facing variants
// ---------------------------------------------------------------------------

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory."
    }

    fn usage(&self) -> &str {
        "list_files [directory]"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory to list. Defaults to the current directory."
                }
            }
        }))
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let dir = directory_arg(args);
        let path = Path::new(&dir);
        if !path.exists() {
            bail!("Directory '{}' does not exist.", dir);
        }
        if !path.is_dir() {
            bail!("'{}' is not a directory.", dir);
        }

        let mut entries = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("Permission denied: Cannot read directory '{}'.", dir))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        Ok(ToolResult::structured([("file_list", names.join(", "))]))
    }
}

/// Accepts a bare path or a `{"directory": ...}` object.
fn directory_arg(args: &str) -> String {
    let trimmed = args.trim();
    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            if let Some(serde_json::Value::String(dir)) = map.get("directory") {
                return dir.clone();
            }
        }
    }
    let dir = rest_arg(trimmed);
    if dir.is_empty() {
        ".".to_string()
    } else {
        dir
    }
}

pub struct ReadFileContentTool;

#[async_trait]
impl Tool for ReadFileContentTool {
    fn name(&self) -> &str {
        "read_file_content"
    }

    fn description(&self) -> &str {
        "Read the content of a file."
    }

    fn usage(&self) -> &str {
        "read_file_content <file_path>"
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read"
                }
            },
            "required": ["file_path"]
        }))
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let path = rest_arg(args);
        if path.is_empty() {
            bail!("No file path provided.");
        }
        let content = read_text(Path::new(&path)).await?;
        Ok(ToolResult::structured([("content", content)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::testutil::scratch_dir;

    fn ctx() -> ToolContext {
        ToolContext::default()
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = scratch_dir("file");
        let path = dir.join("nested/notes.txt");
        let args = format!("write {} hello  world", path.display());
        let out = FileTool.execute(&ctx(), &args).await.unwrap();
        assert!(out.to_plain_text().contains("12 chars"));

        let read = FileTool
            .execute(&ctx(), &format!("read {}", path.display()))
            .await
            .unwrap();
        assert_eq!(read, ToolResult::text("hello  world"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn write_without_content_creates_empty_file() {
        let dir = scratch_dir("file-empty");
        let path = dir.join("empty.txt");
        FileTool
            .execute(&ctx(), &format!("write {} ", path.display()))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn list_puts_directories_first() {
        let dir = scratch_dir("file-list");
        std::fs::create_dir(dir.join("zdir")).unwrap();
        std::fs::write(dir.join("Alpha.txt"), "abc").unwrap();
        let out = FileTool
            .execute(&ctx(), &format!("list {}", dir.display()))
            .await
            .unwrap();
        match out {
            ToolResult::Tree { root } => {
                let labels: Vec<_> = root.children.iter().map(|c| c.label.as_str()).collect();
                assert_eq!(labels, ["zdir/", "Alpha.txt (3 B)"]);
            }
            other => panic!("expected tree, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_file_and_bad_operation_fail() {
        assert!(FileTool
            .execute(&ctx(), "read /definitely/not/here.txt")
            .await
            .is_err());
        let err = FileTool.execute(&ctx(), "frobnicate x").await.unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
        assert!(FileTool.execute(&ctx(), "").await.is_err());
    }

    #[tokio::test]
    async fn list_files_accepts_json_object() {
        let dir = scratch_dir("list-files");
        std::fs::write(dir.join("b.txt"), "").unwrap();
        std::fs::write(dir.join("a.txt"), "").unwrap();
        let args = serde_json::json!({"directory": dir.display().to_string(), "extra": 1}).to_string();
        let out = ListFilesTool.execute(&ctx(), &args).await.unwrap();
        assert_eq!(out, ToolResult::structured([("file_list", "a.txt, b.txt")]));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn read_file_content_is_structured() {
        let dir = scratch_dir("read-content");
        let path = dir.join("x.md");
        std::fs::write(&path, "# title").unwrap();
        let out = ReadFileContentTool
            .execute(&ctx(), &path.display().to_string())
            .await
            .unwrap();
        assert_eq!(out, ToolResult::structured([("content", "# title")]));
        std::fs::remove_dir_all(&dir).ok();
    }
}

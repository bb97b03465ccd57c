//! `find_large`: the biggest files under a directory.

use super::{format_size, relative_display, walk_files};
use crate::tools::args::count_and_path;
use crate::tools::traits::{Tool, ToolContext};
use crate::types::ToolResult;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const DEFAULT_COUNT: usize = 10;

pub struct FindLargeTool;

#[async_trait]
impl Tool for FindLargeTool {
    fn name(&self) -> &str {
        "find_large"
    }

    fn description(&self) -> &str {
        "Find largest files in a directory."
    }

    fn usage(&self) -> &str {
        "find_large [path] [--count=N]"
    }

    async fn execute(&self, _ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let (path, count) = count_and_path(args, DEFAULT_COUNT).map_err(|e| anyhow!(e))?;
        let path = PathBuf::from(path);
        if !path.is_dir() {
            bail!("Not a directory: {}", path.display());
        }

        let root = path.clone();
        let largest = tokio::task::spawn_blocking(move || largest_files(&root, count))
            .await
            .context("File scan failed")?;

        if largest.is_empty() {
            return Ok(ToolResult::text(format!(
                "No files found in '{}'.",
                path.display()
            )));
        }

        Ok(ToolResult::Tabular {
            title: format!("Largest Files: '{}' (Top {})", path.display(), count),
            headers: vec!["Size".into(), "File Path".into()],
            rows: largest
                .into_iter()
                .map(|(p, size)| vec![format_size(size), relative_display(&p, &path)])
                .collect(),
        })
    }
}

/// Top `count` regular files by size, largest first.
fn largest_files(root: &Path, count: usize) -> Vec<(PathBuf, u64)> {
    let mut files = Vec::new();
    walk_files(root, &mut |p, meta| {
        files.push((p.to_path_buf(), meta.len()));
        true
    });
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    files.truncate(count);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::testutil::scratch_dir;

    #[tokio::test]
    async fn ranks_by_size() {
        let dir = scratch_dir("large");
        std::fs::create_dir(dir.join("sub")).unwrap();
        std::fs::write(dir.join("small.bin"), vec![0u8; 10]).unwrap();
        std::fs::write(dir.join("sub/big.bin"), vec![0u8; 4096]).unwrap();
        std::fs::write(dir.join("mid.bin"), vec![0u8; 2048]).unwrap();

        let out = FindLargeTool
            .execute(&ToolContext::default(), &format!("{} --count=2", dir.display()))
            .await
            .unwrap();
        match out {
            ToolResult::Tabular { rows, .. } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0], vec!["4.0 KB".to_string(), format!("sub{}big.bin", std::path::MAIN_SEPARATOR)]);
                assert_eq!(rows[1][1], "mid.bin");
            }
            other => panic!("expected table, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_directory() {
        let dir = scratch_dir("large-empty");
        let out = FindLargeTool
            .execute(&ToolContext::default(), &dir.display().to_string())
            .await
            .unwrap();
        assert!(out.to_plain_text().starts_with("No files found"));
        std::fs::remove_dir_all(&dir).ok();
    }
}

//! Git inspection tools: `git_status`, `git_diff` and `git_log`.

use crate::tools::args::{count_and_path, rest_arg, split_args};
use crate::tools::traits::{Tool, ToolContext};
use crate::types::{ToolResult, TreeNode};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_TIMEOUT: Duration = Duration::from_secs(15);
const GIT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LOG_COUNT: usize = 15;

/// Last path component, resolving `.` and friends first.
fn dir_label(path: &Path) -> String {
    std::fs::canonicalize(path)
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| path.display().to_string())
}

fn directory_or_cwd(arg: &str) -> Result<PathBuf> {
    if arg.is_empty() {
        std::env::current_dir().context("Cannot determine current directory")
    } else {
        Ok(PathBuf::from(arg))
    }
}

/// `Ok(None)` inside a work tree, `Ok(Some(notice))` when `path` is not a
/// repository.
async fn check_work_tree(ctx: &ToolContext, path: &Path) -> Result<Option<ToolResult>> {
    let out = ctx
        .runner
        .run(
            "git",
            &["rev-parse", "--is-inside-work-tree"],
            CHECK_TIMEOUT,
            Some(path),
        )
        .await
        .map_err(|e| anyhow!("Git command not found or failed to start: {}", e))?;

    if out.success() && out.stdout.trim() == "true" {
        return Ok(None);
    }
    if out.stderr.to_lowercase().contains("not a git repository") || out.success() {
        return Ok(Some(ToolResult::text(format!(
            "Not a Git repository: {}",
            path.display()
        ))));
    }
    bail!(
        "Error checking Git repository status for {}: {}",
        path.display(),
        out.stderr.trim()
    )
}

// ---------------------------------------------------------------------------
// git_status
// ---------------------------------------------------------------------------

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn description(&self) -> &str {
        "Get Git status for a directory."
    }

    fn usage(&self) -> &str {
        "git_status [path]"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let path = directory_or_cwd(&rest_arg(args))?;
        if !path.is_dir() {
            bail!("Not a valid directory: {}", path.display());
        }
        if let Some(notice) = check_work_tree(ctx, &path).await? {
            return Ok(notice);
        }

        let out = ctx
            .runner
            .run("git", &["status", "--porcelain=v1"], STATUS_TIMEOUT, Some(&path))
            .await?;
        if !out.success() {
            bail!(
                "Error getting Git status for {}: {}",
                path.display(),
                out.stderr.trim()
            );
        }

        let label = dir_label(&path);
        match parse_porcelain(&label, &out.stdout) {
            Some(root) => Ok(ToolResult::Tree { root }),
            None => Ok(ToolResult::text(format!(
                "Git status for '{}': Clean working directory.",
                label
            ))),
        }
    }
}

fn status_name(code: char) -> &'static str {
    match code {
        'M' => "Modified",
        'A' => "Added",
        'D' => "Deleted",
        'R' => "Renamed",
        'C' => "Copied",
        'U' => "Unmerged",
        '?' => "Untracked",
        '!' => "Ignored",
        'T' => "Type changed",
        _ => "Unknown",
    }
}

/// Group `git status --porcelain=v1` lines into staged, unstaged and
/// untracked branches. `None` means a clean tree.
pub(crate) fn parse_porcelain(label: &str, output: &str) -> Option<TreeNode> {
    let mut staged = TreeNode::new("Staged Changes");
    let mut unstaged = TreeNode::new("Unstaged Changes");
    let mut untracked = TreeNode::new("Untracked Files");

    for line in output.lines() {
        let mut codes = line.chars();
        let (Some(index), Some(worktree)) = (codes.next(), codes.next()) else {
            continue;
        };
        let Some(file) = line.get(3..).filter(|f| !f.is_empty()) else {
            continue;
        };

        if index == '?' && worktree == '?' {
            untracked.push(TreeNode::new(format!("{}: {}", status_name('?'), file)));
            continue;
        }
        if index != ' ' && index != '?' {
            staged.push(TreeNode::new(format!("{}: {}", status_name(index), file)));
        }
        if worktree != ' ' && worktree != '?' {
            let entry = if index == ' ' || index == '?' {
                format!("{}: {}", status_name(worktree), file)
            } else {
                format!("{} (unstaged): {}", status_name(worktree), file)
            };
            if index == ' ' || index == '?' || index != worktree {
                unstaged.push(TreeNode::new(entry));
            }
        }
    }

    let mut root = TreeNode::new(format!("Git Status: '{}'", label));
    for group in [staged, unstaged, untracked] {
        if !group.children.is_empty() {
            root.push(group);
        }
    }
    if root.children.is_empty() {
        None
    } else {
        Some(root)
    }
}

// ---------------------------------------------------------------------------
// git_diff
// ---------------------------------------------------------------------------

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &str {
        "git_diff"
    }

    fn description(&self) -> &str {
        "Show Git diff between two files/commits/branches."
    }

    fn usage(&self) -> &str {
        "git_diff <file1> <file2>"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let files = split_args(args);
        let [first, second] = files.as_slice() else {
            bail!("Please provide two file paths to compare (e.g., git_diff file1 file2).");
        };
        if !Path::new(first).exists() || !Path::new(second).exists() {
            bail!("One or both files not found: {}, {}", first, second);
        }

        let out = ctx
            .runner
            .run(
                "git",
                &["diff", "--no-index", "--", first.as_str(), second.as_str()],
                GIT_TIMEOUT,
                None,
            )
            .await?;

        // --no-index exits 1 when the inputs differ.
        match out.exit_code {
            0 | 1 if out.stdout.trim().is_empty() => Ok(ToolResult::text(format!(
                "No differences found between '{}' and '{}'.",
                first, second
            ))),
            0 | 1 => Ok(ToolResult::text(out.stdout.trim_end())),
            _ => bail!("Error getting Git diff: {}", out.stderr.trim()),
        }
    }
}

// ---------------------------------------------------------------------------
// git_log
// ---------------------------------------------------------------------------

pub struct GitLogTool;

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Show Git commit log for a repository."
    }

    fn usage(&self) -> &str {
        "git_log [path] [--count=N]"
    }

    async fn execute(&self, ctx: &ToolContext, args: &str) -> Result<ToolResult> {
        let (path, count) = count_and_path(args, DEFAULT_LOG_COUNT).map_err(|e| anyhow!(e))?;
        let path = PathBuf::from(path);
        if !path.is_dir() {
            bail!("Not a directory: {}", path.display());
        }
        if let Some(notice) = check_work_tree(ctx, &path).await? {
            return Ok(notice);
        }

        let max_count = format!("--max-count={}", count);
        let out = ctx
            .runner
            .run("git", &["log", max_count.as_str()], GIT_TIMEOUT, Some(&path))
            .await?;

        let label = dir_label(&path);
        if !out.success() {
            if out.stderr.contains("does not have any commits") {
                return Ok(ToolResult::text(format!("No commits found in '{}'.", label)));
            }
            bail!("Error getting Git log: {}", out.stderr.trim());
        }
        if out.stdout.trim().is_empty() {
            return Ok(ToolResult::text(format!("No commits found in '{}'.", label)));
        }
        Ok(ToolResult::text(format!(
            "Git Log: '{}' (Last {})\n\n{}",
            label,
            count,
            out.stdout.trim_end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::testutil::scratch_dir;

    #[test]
    fn porcelain_groups_changes() {
        let output = "M  src/lib.rs\n M README.md\nAM new.rs\n?? scratch.txt\nR  old.rs -> renamed.rs\n";
        let root = parse_porcelain("repo", output).unwrap();
        assert_eq!(root.label, "Git Status: 'repo'");

        let labels: Vec<_> = root.children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Staged Changes", "Unstaged Changes", "Untracked Files"]);

        let staged: Vec<_> = root.children[0].children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            staged,
            ["Modified: src/lib.rs", "Added: new.rs", "Renamed: old.rs -> renamed.rs"]
        );
        let unstaged: Vec<_> = root.children[1].children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(unstaged, ["Modified: README.md", "Modified (unstaged): new.rs"]);
        assert_eq!(root.children[2].children[0].label, "Untracked: scratch.txt");
    }

    #[test]
    fn porcelain_leading_space_is_preserved() {
        // A worktree-only change starts with a space; it must not be
        // mistaken for a staged change.
        let root = parse_porcelain("r", " D gone.txt\n").unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].label, "Unstaged Changes");
        assert_eq!(root.children[0].children[0].label, "Deleted: gone.txt");
    }

    #[test]
    fn clean_tree_is_none() {
        assert!(parse_porcelain("r", "").is_none());
        assert!(parse_porcelain("r", "\n\n").is_none());
    }

    #[test]
    fn same_staged_and_unstaged_kind_is_listed_once() {
        let root = parse_porcelain("r", "MM both.rs\n").unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].label, "Staged Changes");
    }

    #[tokio::test]
    async fn git_diff_needs_two_existing_files() {
        let ctx = ToolContext::default();
        assert!(GitDiffTool.execute(&ctx, "one").await.is_err());
        let err = GitDiffTool
            .execute(&ctx, "/no/such/a /no/such/b")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn git_diff_reports_differences() {
        let dir = scratch_dir("git-diff");
        let a = dir.join("a.txt");
        let b = dir.join("b.txt");
        std::fs::write(&a, "x\n").unwrap();
        std::fs::write(&b, "y\n").unwrap();
        let args = format!("{} {}", a.display(), b.display());
        match GitDiffTool.execute(&ToolContext::default(), &args).await {
            Ok(out) => {
                let text = out.to_plain_text();
                assert!(text.contains("-x"));
                assert!(text.contains("+y"));
            }
            // git is not installed here.
            Err(e) => assert!(e.to_string().contains("not found")),
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn git_log_rejects_bad_count() {
        let err = GitLogTool
            .execute(&ToolContext::default(), ". --count=abc")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid count"));
    }

    #[tokio::test]
    async fn status_outside_repository() {
        let dir = scratch_dir("git-status");
        match GitStatusTool
            .execute(&ToolContext::default(), &dir.display().to_string())
            .await
        {
            Ok(out) => assert!(out.to_plain_text().starts_with("Not a Git repository")),
            Err(e) => assert!(e.to_string().contains("Git")),
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}

//! Built-in tools registered at startup.

pub mod clipboard;
pub mod diff;
pub mod file;
pub mod find_large;
pub mod git;
pub mod lint;
pub mod network;
pub mod open;
pub mod pip;
pub mod search;
pub mod shell;
pub mod system;

use crate::tools::traits::Tool;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every built-in tool, in registration order.
pub fn all() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(file::FileTool),
        Box::new(file::ListFilesTool),
        Box::new(file::ReadFileContentTool),
        Box::new(shell::ShellTool),
        Box::new(shell::ExecuteCodeTool),
        Box::new(search::SearchFilesTool),
        Box::new(open::OpenTool),
        Box::new(system::SysInfoTool),
        Box::new(system::SystemStatsTool),
        Box::new(system::DateTimeTool),
        Box::new(system::PsTool),
        Box::new(system::ListProcessesTool),
        Box::new(clipboard::ClipboardTool),
        Box::new(diff::DiffTool),
        Box::new(pip::PipTool),
        Box::new(git::GitStatusTool),
        Box::new(git::GitDiffTool),
        Box::new(git::GitLogTool),
        Box::new(lint::LintTool),
        Box::new(find_large::FindLargeTool),
        Box::new(network::PingTool),
        Box::new(network::CurlTool),
    ]
}

/// Human-readable byte size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b < KB => format!("{} B", b),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

/// Depth-first walk over regular files below `root`.
///
/// Unreadable directories are skipped. Symlinks are not followed into.
/// The visitor returns `false` to stop the walk early.
pub(crate) fn walk_files(root: &Path, visit: &mut dyn FnMut(&Path, &fs::Metadata) -> bool) {
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping {}: {}", dir.display(), e);
                continue;
            }
        };
        let mut children: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        children.sort_by_key(|e| e.file_name());
        // Reverse so that the stack pops directories in name order.
        for entry in children.into_iter().rev() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                if let Ok(meta) = entry.metadata() {
                    if !visit(&path, &meta) {
                        return;
                    }
                }
            }
        }
    }
}

/// `path` relative to `base`, falling back to the full path.
pub(crate) fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

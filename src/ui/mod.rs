//! Terminal presentation of tool results and model replies.
//!
//! Rendering returns strings; the REPL decides where they go. Colour is
//! applied only when the [`PresentationContext`] asks for it, so the same
//! renderer serves pipes and tests.

use crate::types::{ToolResult, TreeNode};
use colored::{ColoredString, Colorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Default,
    /// Bold and dim only.
    Mono,
}

impl Theme {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "mono" | "plain" | "none" => Self::Mono,
            _ => Self::Default,
        }
    }
}

/// Passed explicitly to everything that prints.
#[derive(Debug, Clone, Copy)]
pub struct PresentationContext {
    pub color: bool,
    pub theme: Theme,
}

impl PresentationContext {
    pub fn plain() -> Self {
        Self {
            color: false,
            theme: Theme::Mono,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Title,
    Key,
    Error,
    Warning,
    Success,
    Info,
    Dim,
}

#[derive(Debug, Clone, Copy)]
pub struct Presenter {
    ctx: PresentationContext,
}

impl Presenter {
    pub fn new(ctx: PresentationContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> PresentationContext {
        self.ctx
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if !self.ctx.color {
            return text.to_string();
        }
        let s: ColoredString = match (self.ctx.theme, style) {
            (Theme::Mono, Style::Title | Style::Key | Style::Error) => text.bold(),
            (Theme::Mono, Style::Dim) => text.dimmed(),
            (Theme::Mono, _) => text.normal(),
            (Theme::Default, Style::Title) => text.cyan().bold(),
            (Theme::Default, Style::Key) => text.bold(),
            (Theme::Default, Style::Error) => text.red().bold(),
            (Theme::Default, Style::Warning) => text.yellow(),
            (Theme::Default, Style::Success) => text.green(),
            (Theme::Default, Style::Info) => text.blue(),
            (Theme::Default, Style::Dim) => text.dimmed(),
        };
        s.to_string()
    }

    pub fn error(&self, message: &str) -> String {
        format!("{} {}", self.paint("Error:", Style::Error), message)
    }

    pub fn warning(&self, message: &str) -> String {
        self.paint(message, Style::Warning)
    }

    pub fn info(&self, message: &str) -> String {
        self.paint(message, Style::Info)
    }

    pub fn success(&self, message: &str) -> String {
        self.paint(message, Style::Success)
    }

    /// `[3] gemini-2.0-flash > `
    pub fn prompt(&self, user_messages: usize, model: &str) -> String {
        format!(
            "{} {} {} ",
            self.paint(&format!("[{}]", user_messages), Style::Dim),
            self.paint(model, Style::Info),
            self.paint(">", Style::Success)
        )
    }

    /// Final model text under a heading.
    pub fn model_reply(&self, text: &str, tool_calls: &[String]) -> String {
        let mut out = self.paint("Gemini", Style::Title);
        if !tool_calls.is_empty() {
            out.push_str(&self.paint(&format!(" (tools: {})", tool_calls.join(", ")), Style::Dim));
        }
        out.push('\n');
        out.push_str(text.trim_end());
        out
    }

    /// Render any tool result under `title`.
    pub fn tool_result(&self, title: &str, result: &ToolResult) -> String {
        let heading = self.paint(title, Style::Title);
        let body = match result {
            ToolResult::Text { text } => text.trim_end().to_string(),
            ToolResult::Error { message } => self.error(message),
            ToolResult::Structured { fields } => self.pairs(fields).join("\n"),
            ToolResult::Tabular {
                title,
                headers,
                rows,
            } => {
                let mut lines = Vec::new();
                if !title.is_empty() {
                    lines.push(self.paint(title, Style::Key));
                }
                let table = table_lines(headers, rows);
                let mut table = table.into_iter();
                if let Some(header) = table.next() {
                    lines.push(self.paint(&header, Style::Key));
                }
                lines.extend(table);
                if rows.is_empty() {
                    lines.push(self.paint("(no rows)", Style::Dim));
                }
                lines.join("\n")
            }
            ToolResult::Tree { root } => {
                let mut lines = tree_lines(root).into_iter();
                let mut out = Vec::new();
                if let Some(first) = lines.next() {
                    out.push(self.paint(&first, Style::Key));
                }
                out.extend(lines);
                out.join("\n")
            }
        };
        format!("{}\n{}", heading, body)
    }

    /// Key/value lines with keys padded to a common width.
    pub fn pairs(&self, fields: &[(String, String)]) -> Vec<String> {
        let width = fields.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        fields
            .iter()
            .map(|(k, v)| {
                let padded = format!("{:<width$}", k, width = width);
                format!("  {}  {}", self.paint(&padded, Style::Key), v)
            })
            .collect()
    }

    /// Two-column listing such as `/help` or `/tools`.
    pub fn listing(&self, title: &str, entries: &[(String, String)]) -> String {
        let mut out = self.paint(title, Style::Title);
        for line in self.pairs(entries) {
            out.push('\n');
            out.push_str(&line);
        }
        out
    }
}

/// Header, separator and rows, each column padded to its widest cell.
pub fn table_lines(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let columns = headers
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(headers).chain(rows.iter().map(Vec::as_slice)) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render = |cells: &[String]| -> String {
        let line: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                format!("{:<width$}", cell, width = *w)
            })
            .collect();
        line.join("  ").trim_end().to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render(headers));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|r| render(r.as_slice())));
    lines
}

/// Root label followed by children drawn with box guides.
pub fn tree_lines(root: &TreeNode) -> Vec<String> {
    let mut lines = vec![root.label.clone()];
    walk_tree(&root.children, "", &mut lines);
    lines
}

fn walk_tree(children: &[TreeNode], prefix: &str, out: &mut Vec<String>) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let (branch, carry) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        out.push(format!("{}{}{}", prefix, branch, child.label));
        walk_tree(&child.children, &format!("{}{}", prefix, carry), out);
    }
}

//! Pattern interpreter: turns common English phrasings into tool calls.
//!
//! Rules are tried in table order and the first match wins. The order is
//! load-bearing:
//! - the bare `create file X` rule captures `X in Y` too, so the
//!   `create file X in Y` rule below it never fires;
//! - `read|show|cat` runs before the exact system-info phrases, so
//!   `show system info` becomes a file read;
//! - `run|execute` accepts anything and must stay after the file rules;
//! - patterns are unanchored, so `ls` and `run` also match inside words.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Context carried between interpretations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Directory used for bare file names and set by `cd`.
    pub current_dir: Option<PathBuf>,
    /// Free-form `key=value` notes set with `/context`.
    pub notes: BTreeMap<String, String>,
}

impl SessionContext {
    pub fn is_empty(&self) -> bool {
        self.current_dir.is_none() && self.notes.is_empty()
    }

    /// JSON object of everything set, for prompts and display.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if let Some(dir) = &self.current_dir {
            map.insert("current_dir".into(), dir.display().to_string().into());
        }
        for (key, value) in &self.notes {
            map.insert(key.clone(), value.clone().into());
        }
        serde_json::Value::Object(map)
    }
}

/// What a matching rule produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    Tool { name: String, args: String },
    /// A `cd`-style request; the caller resolves it against the filesystem.
    ChangeDirectory(String),
}

impl Interpretation {
    fn tool(name: &str, args: impl Into<String>) -> Self {
        Self::Tool {
            name: name.to_string(),
            args: args.into(),
        }
    }
}

type Build = fn(&Captures<'_>, &SessionContext) -> Interpretation;

struct Rule {
    name: &'static str,
    pattern: Regex,
    build: Build,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, build: Build) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("valid regex"),
            build,
        }
    }
}

const PATH_CHARS: &str = r"[\w./ -]+";

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::new(
            "create-file",
            &format!(r"(?i)create (?:a )?file (?:called |named )?({PATH_CHARS})"),
            |caps, ctx| {
                let raw = caps[1].trim();
                let path = match &ctx.current_dir {
                    Some(dir) if !raw.contains('/') => dir.join(raw).to_string_lossy().into_owned(),
                    _ => raw.to_string(),
                };
                Interpretation::tool("file", format!("write {} ", quote_if_spaced(&normalize_path(&path))))
            },
        ),
        Rule::new(
            "create-file-in",
            &format!(r"(?i)create (?:a )?file (?:called |named )?'?([\w.-]+)'? in '?({PATH_CHARS})'?"),
            |caps, _| {
                let path = Path::new(caps[2].trim()).join(caps[1].trim());
                let path = normalize_path(&path.to_string_lossy());
                Interpretation::tool("file", format!(r#"write "{path}" """#))
            },
        ),
        Rule::new(
            "write-file",
            &format!(r"write '(.+?)' to (?:file )?({PATH_CHARS})"),
            |caps, _| {
                let path = normalize_path(caps[2].trim());
                Interpretation::tool("file", format!(r#"write "{}" "{}""#, path, escape(&caps[1])))
            },
        ),
        Rule::new(
            "read-file",
            &format!(r"(?i)(?:read|show|cat) (?:file )?({PATH_CHARS})"),
            |caps, _| Interpretation::tool("file", format!(r#"read "{}""#, normalize_path(caps[1].trim()))),
        ),
        Rule::new(
            "list-files",
            &format!(r"(?i)(?:list files|ls)(?: in)? ({PATH_CHARS})"),
            |caps, _| Interpretation::tool("file", format!(r#"list "{}""#, normalize_path(caps[1].trim()))),
        ),
        Rule::new("list-here", r"(?i)^(?:list files|ls)$", |_, _| {
            Interpretation::tool("file", "list .")
        }),
        Rule::new("run-command", r"(?i)(?:run|execute) (?:command )?(.+)", |caps, _| {
            Interpretation::tool("shell", strip_quotes(caps[1].trim()))
        }),
        Rule::new("open", r"(?i)open ([\w./:-]+)", |caps, _| {
            let target = caps[1].trim();
            let target = if target.starts_with("http://") || target.starts_with("https://") {
                target.to_string()
            } else {
                normalize_path(target)
            };
            Interpretation::tool("open", target)
        }),
        Rule::new(
            "system-info",
            r"(?i)^(?:system info|show system info|sys info|check system status)$",
            |_, _| Interpretation::tool("sys_info", ""),
        ),
        Rule::new("git-status", r"(?i)^(?:git status|check git status)$", |_, _| {
            Interpretation::tool("git_status", "")
        }),
        Rule::new(
            "search-for",
            &format!(r"search for '(.+?)'(?: in)? ({PATH_CHARS})"),
            |caps, _| {
                Interpretation::tool(
                    "search_files",
                    format!(r#""{}" "{}""#, escape(&caps[1]), caps[2].trim()),
                )
            },
        ),
        Rule::new(
            "find",
            &format!(r"(?i)find (?:file |files? )?'?([\w.*-]+)'?(?: in)? ({PATH_CHARS})"),
            |caps, _| {
                Interpretation::tool(
                    "search_files",
                    format!(r#""{}" "{}""#, caps[1].trim(), caps[2].trim()),
                )
            },
        ),
        Rule::new(
            "change-directory",
            &format!(r"(?i)(?:go to|cd)(?: directory)? ({PATH_CHARS})"),
            |caps, _| Interpretation::ChangeDirectory(caps[1].trim().to_string()),
        ),
    ]
});

/// Interpret `message`, returning the first rule's result.
pub fn interpret(message: &str, ctx: &SessionContext) -> Option<Interpretation> {
    interpret_with_rule(message, ctx).map(|(_, i)| i)
}

/// Like [`interpret`], also naming the rule that matched.
pub fn interpret_with_rule(
    message: &str,
    ctx: &SessionContext,
) -> Option<(&'static str, Interpretation)> {
    let message = message.trim();
    RULES.iter().find_map(|rule| {
        rule.pattern
            .captures(message)
            .map(|caps| (rule.name, (rule.build)(&caps, ctx)))
    })
}

/// Lexically normalise a path: collapse separators and `.` segments.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    match (absolute, parts.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => ".".to_string(),
        (true, false) => format!("/{}", parts.join("/")),
        (false, false) => parts.join("/"),
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn quote_if_spaced(path: &str) -> String {
    if path.contains(char::is_whitespace) {
        format!("\"{}\"", escape(path))
    } else {
        path.to_string()
    }
}

fn strip_quotes(command: &str) -> String {
    const QUOTES: [char; 3] = ['`', '"', '\''];
    if command.starts_with(QUOTES) && command.ends_with(QUOTES) {
        let mut chars = command.chars();
        chars.next();
        chars.next_back();
        chars.as_str().to_string()
    } else {
        command.to_string()
    }
}

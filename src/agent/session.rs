//! Saved conversations: `{ "model": ..., "history": [...] }` as JSON.

use super::history::{History, PairingError};
use crate::types::Message;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("session file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: PairingError,
    },
}

/// On-disk shape of a saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSession {
    pub model: String,
    pub history: Vec<Message>,
}

/// A loaded session whose history passed validation.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub model: String,
    pub history: History,
}

/// Default file name for `/save`, stamped with local time.
pub fn default_session_file() -> String {
    chrono::Local::now()
        .format("conversation_%Y%m%d_%H%M%S.json")
        .to_string()
}

pub fn save_session(path: &Path, model: &str, history: &History) -> Result<(), SessionError> {
    let io_err = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let saved = SavedSession {
        model: model.to_string(),
        history: history.snapshot(),
    };
    let json = serde_json::to_string_pretty(&saved).map_err(|source| SessionError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_err)?;

    info!("Saved {} messages to {}", history.len(), path.display());
    Ok(())
}

/// Load and validate a saved session. Broken call/result pairing is an
/// error; nothing is dropped or re-paired.
pub fn load_session(path: &Path) -> Result<LoadedSession, SessionError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let saved: SavedSession = serde_json::from_str(&raw).map_err(|source| SessionError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let history = History::from_messages(saved.history).map_err(|source| SessionError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Loaded {} messages from {}", history.len(), path.display());
    Ok(LoadedSession {
        model: saved.model,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionCallRequest, FunctionResult, ToolResult};
    use serde_json::Map;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("gemini-terminal-session-{}", ulid::Ulid::new()))
            .join(name)
    }

    fn paired_history() -> History {
        let call = FunctionCallRequest::new("ps", Map::new());
        History::from_messages(vec![
            Message::user("what is running?"),
            Message::function_call(call),
            Message::function_result(FunctionResult::from_tool_result(
                "ps",
                &ToolResult::error("boom"),
            )),
            Message::model("Nothing much."),
        ])
        .unwrap()
    }

    #[test]
    fn save_and_load_preserve_order_and_roles() {
        let path = scratch("session.json");
        let history = paired_history();
        save_session(&path, "gemini-2.0-flash", &history).unwrap();

        let loaded = load_session(&path).unwrap();
        assert_eq!(loaded.model, "gemini-2.0-flash");
        assert_eq!(loaded.history, history);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["history"][1]["role"], "function_call");
        assert_eq!(raw["history"][2]["content"]["response"]["error"], "boom");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn unpaired_trailing_call_is_malformed() {
        let path = scratch("broken.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let saved = SavedSession {
            model: "gemini-2.0-flash".into(),
            history: vec![
                Message::user("hi"),
                Message::function_call(FunctionCallRequest::new("ps", Map::new())),
            ],
        };
        std::fs::write(&path, serde_json::to_string(&saved).unwrap()).unwrap();

        let err = load_session(&path).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Malformed {
                source: PairingError::UnpairedCall { .. },
                ..
            }
        ));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn missing_and_invalid_files() {
        assert!(matches!(
            load_session(Path::new("/no/such/session.json")).unwrap_err(),
            SessionError::Io { .. }
        ));

        let path = scratch("garbage.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"model\": 1}").unwrap();
        assert!(matches!(load_session(&path).unwrap_err(), SessionError::Parse { .. }));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn default_file_name_shape() {
        let name = default_session_file();
        assert!(name.starts_with("conversation_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "conversation_20250101_120000.json".len());
    }
}

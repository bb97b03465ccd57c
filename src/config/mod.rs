pub mod schema;

pub use schema::AssistantConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable that overrides `api_key`.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Models offered by `/models`, with a short description.
pub const AVAILABLE_MODELS: &[(&str, &str)] = &[
    ("gemini-2.5-pro-exp-03-25", "Most capable model with advanced reasoning"),
    ("gemini-2.5-flash-preview-04-17", "Fast model with thinking support"),
    ("gemini-2.0-flash", "Well-balanced multimodal model for most tasks"),
    ("gemini-2.0-flash-lite", "Fastest and cheapest model for quick responses"),
    ("gemini-1.5-pro", "Long-context model"),
    ("gemini-1.5-flash", "Previous-generation fast model"),
];

pub fn is_known_model(name: &str) -> bool {
    AVAILABLE_MODELS.iter().any(|(m, _)| *m == name)
}

/// Default assistant home directory (~/.gemini-terminal).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".gemini-terminal"))
        .unwrap_or_else(|| PathBuf::from(".gemini-terminal"))
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    default_home_dir().join("config.toml")
}

/// Expand a leading `~` in a user-supplied path.
pub fn resolve_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<AssistantConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read assistant config file")?;
        let config: AssistantConfig =
            toml::from_str(&contents).context("Failed to parse assistant config (TOML)")?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(AssistantConfig::default())
    }
}

/// Apply environment overrides on top of a loaded config.
pub fn apply_env(config: &mut AssistantConfig) {
    apply_env_from(config, std::env::var(API_KEY_ENV).ok());
}

fn apply_env_from(config: &mut AssistantConfig, api_key: Option<String>) {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.api_key = key.trim().to_string();
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AssistantConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

/// Save settings changed at runtime.
///
/// The key written is the one already in the file (none for a new file),
/// so a key supplied through `GEMINI_API_KEY` never reaches disk.
pub fn save_settings(config: &AssistantConfig, path: &Path) -> Result<()> {
    let stored_key = if path.exists() {
        load_config(path)?.api_key
    } else {
        String::new()
    };
    let to_write = AssistantConfig {
        api_key: stored_key,
        ..config.clone()
    };
    save_config(&to_write, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("gemini-terminal-config-{}", ulid::Ulid::new()))
            .join(name)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = load_config(Path::new("/definitely/not/here/config.toml")).unwrap();
        assert_eq!(cfg, AssistantConfig::default());
        assert_eq!(cfg.model, "gemini-2.0-flash");
        assert_eq!(cfg.max_follow_ups, 1);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = scratch_file("config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "model = \"gemini-1.5-pro\"\nallow_execution = false\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.model, "gemini-1.5-pro");
        assert!(!cfg.allow_execution);
        assert_eq!(cfg.top_k, 40);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn save_then_load() {
        let path = scratch_file("nested/config.toml");
        let cfg = AssistantConfig {
            temperature: 0.2,
            max_follow_ups: 3,
            ..AssistantConfig::default()
        };
        save_config(&cfg, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), cfg);
        std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap()).ok();
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let path = scratch_file("bad.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "model = [").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parse"));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn env_key_overrides_file() {
        let mut cfg = AssistantConfig {
            api_key: "from-file".into(),
            ..AssistantConfig::default()
        };
        apply_env_from(&mut cfg, Some("  ".into()));
        assert_eq!(cfg.api_key, "from-file");
        apply_env_from(&mut cfg, Some("from-env".into()));
        assert_eq!(cfg.api_key, "from-env");
    }

    #[test]
    fn runtime_saves_keep_env_key_off_disk() {
        let path = scratch_file("config.toml");
        let mut cfg = AssistantConfig::default();
        apply_env_from(&mut cfg, Some("env-secret".into()));
        cfg.model = "gemini-1.5-pro".into();

        save_settings(&cfg, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("env-secret"));
        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.api_key, "");
        assert_eq!(reloaded.model, "gemini-1.5-pro");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn runtime_saves_keep_file_key() {
        let path = scratch_file("config.toml");
        let on_disk = AssistantConfig {
            api_key: "file-key".into(),
            ..AssistantConfig::default()
        };
        save_config(&on_disk, &path).unwrap();

        let mut cfg = load_config(&path).unwrap();
        apply_env_from(&mut cfg, Some("env-secret".into()));
        cfg.system_message = "Be brief.".into();
        save_settings(&cfg, &path).unwrap();

        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.api_key, "file-key");
        assert_eq!(reloaded.system_message, "Be brief.");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn api_key_is_masked() {
        let mut cfg = AssistantConfig::default();
        assert_eq!(cfg.masked_api_key(), "[Not Set]");
        cfg.api_key = "abc".into();
        assert_eq!(cfg.masked_api_key(), "[Set]");
        cfg.api_key = "AIzaSecret1234".into();
        assert_eq!(cfg.masked_api_key(), "**********1234");
        assert!(cfg
            .display_rows()
            .iter()
            .all(|(_, v)| !v.contains("Secret")));
    }

    #[test]
    fn known_models() {
        assert!(is_known_model("gemini-2.0-flash"));
        assert!(!is_known_model("gpt-4o"));
    }
}

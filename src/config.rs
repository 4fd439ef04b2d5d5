use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::model::FileIdentity;

const CONFIG_FILE_NAME: &str = "boardlink.json";
const CONFIG_ENV: &str = "BOARDLINK_CONFIG";

fn default_language() -> String {
    crate::i18n::DEFAULT_LANGUAGE.to_string()
}

fn default_file() -> FileIdentity {
    FileIdentity::new("/sd", "autorun.lua")
}

fn default_port() -> String {
    "local".to_string()
}

fn default_board_root() -> PathBuf {
    PathBuf::from("board")
}

fn default_true() -> bool {
    true
}

fn default_info_dismiss_ms() -> u64 {
    1500
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs").join("boardlink.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            level: default_log_level(),
        }
    }
}

/// Session state restored at startup and written back when it changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedSession {
    #[serde(default)]
    pub linked: bool,
    #[serde(default)]
    pub blocks_file: Option<FileIdentity>,
    #[serde(default)]
    pub editor_file: Option<FileIdentity>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub messages_dir: Option<PathBuf>,
    #[serde(default = "default_file")]
    pub default_file: FileIdentity,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_board_root")]
    pub board_root: PathBuf,
    #[serde(default = "default_true")]
    pub notify_device_errors: bool,
    #[serde(default = "default_info_dismiss_ms")]
    pub info_dismiss_ms: u64,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub session: PersistedSession,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            messages_dir: None,
            default_file: default_file(),
            port: default_port(),
            board_root: default_board_root(),
            notify_device_errors: true,
            info_dismiss_ms: default_info_dismiss_ms(),
            log: LogConfig::default(),
            session: PersistedSession::default(),
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    // Prefer a stable per-user location.
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("APPDATA").map(PathBuf::from))
        .map(|p| p.join("boardlink"))
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    if let Some(dir) = config_dir() {
        return dir.join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn read(path: &Path) -> Result<AppConfig, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Loads the config, falling back to defaults when it is missing or malformed.
pub fn load(path: &Path) -> AppConfig {
    match read(path) {
        Ok(cfg) => cfg,
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            AppConfig::default()
        }
        Err(err) => {
            warn!(path = %path.display(), "using default config: {err}");
            AppConfig::default()
        }
    }
}

pub fn save(path: &Path, cfg: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_vec_pretty(cfg)?;

    // Atomic replace; fall back to copy + remove when rename crosses devices.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|source| ConfigError::Write {
        path: tmp.clone(),
        source,
    })?;
    if fs::rename(&tmp, path).is_err() {
        let copied = fs::copy(&tmp, path);
        let _ = fs::remove_file(&tmp);
        copied.map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.default_file, FileIdentity::new("/sd", "autorun.lua"));
        assert_eq!(cfg.info_dismiss_ms, 1500);
        assert!(cfg.notify_device_errors);
    }

    #[test]
    fn save_then_load_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("boardlink.json");
        let mut cfg = AppConfig::default();
        cfg.session.linked = true;
        cfg.session.editor_file = Some(FileIdentity::new("/sd/lib", "util.lua"));
        save(&path, &cfg).unwrap();
        assert_eq!(load(&path), cfg);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boardlink.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(read(&path), Err(ConfigError::Json(_))));
        assert_eq!(load(&path), AppConfig::default());
    }
}

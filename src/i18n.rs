//! Message lookup for user-facing strings.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ca", "es"];
pub const DEFAULT_LANGUAGE: &str = "en";

static ENGLISH: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("blocks", "Blocks"),
        ("editor", "Lua"),
        ("board", "Board"),
        ("console", "Console"),
        ("information", "Information"),
        ("sendingCode", "Sending code ..."),
        ("retrievingDirectory", "Retrieving directory ..."),
        ("downloadingFile", "Downloading file"),
        ("upgradingFirmware", "Upgrading firmware ..."),
        ("firmwareUpgraded", "Firmware upgraded"),
        ("boardConnected", "Board connected"),
        ("boardDisconnected", "Board disconnected"),
        (
            "boardInBootloaderMode",
            "Your board is in bootloader mode and has no firmware yet. Please select a firmware and upgrade your board.",
        ),
        ("DELETE_EDIT_CODE", "Do you want to delete the code in the editor?"),
        ("DELETE_ALL_BLOCKS", "Delete all %1 blocks?"),
        ("badCode", "Program error:\n %1"),
        ("deviceError", "Board command failed: %1"),
    ])
});

/// Maps an arbitrary language code to a supported one, defaulting to English.
pub fn resolve_language(code: &str) -> &'static str {
    let code = code.trim().to_ascii_lowercase();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|lang| *lang == code)
        .unwrap_or(DEFAULT_LANGUAGE)
}

#[derive(Clone, Debug, Default)]
pub struct MessageCatalog {
    language: String,
    overrides: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn english() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            overrides: HashMap::new(),
        }
    }

    /// Catalog for `language`, reading `<dir>/<lang>.toml` when a directory is
    /// given and the file exists. A missing file is not an error.
    pub fn load(language: &str, dir: Option<&Path>) -> Result<Self, ConfigError> {
        let language = resolve_language(language);
        let mut catalog = Self {
            language: language.to_string(),
            overrides: HashMap::new(),
        };
        let Some(dir) = dir else {
            return Ok(catalog);
        };
        let path = dir.join(format!("{language}.toml"));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no message catalog file");
                return Ok(catalog);
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        catalog.overrides = Self::parse_table(&text).map_err(|source| ConfigError::Catalog {
            path: path.clone(),
            source,
        })?;
        Ok(catalog)
    }

    pub fn from_toml(language: &str, text: &str) -> Result<Self, toml::de::Error> {
        Ok(Self {
            language: resolve_language(language).to_string(),
            overrides: Self::parse_table(text)?,
        })
    }

    fn parse_table(text: &str) -> Result<HashMap<String, String>, toml::de::Error> {
        let table: toml::Table = text.parse()?;
        let mut out = HashMap::new();
        for (key, value) in table {
            match value {
                toml::Value::String(s) => {
                    out.insert(key, s);
                }
                other => warn!(%key, kind = other.type_str(), "ignoring non-string message"),
            }
        }
        Ok(out)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Catalog value, else the English default, else the key itself.
    pub fn lookup(&self, key: &str) -> String {
        if let Some(value) = self.overrides.get(key) {
            return value.clone();
        }
        match ENGLISH.get(key) {
            Some(value) => (*value).to_string(),
            None => key.to_string(),
        }
    }

    /// Lookup with `%1` replaced by `arg`.
    pub fn format1(&self, key: &str, arg: impl std::fmt::Display) -> String {
        self.lookup(key).replace("%1", &arg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(resolve_language("CA"), "ca");
        assert_eq!(resolve_language("fr"), "en");
        assert_eq!(resolve_language(""), "en");
    }

    #[test]
    fn overrides_win_over_defaults() {
        let catalog = MessageCatalog::from_toml("ca", "board = \"Placa\"\nlimit = 3\n").unwrap();
        assert_eq!(catalog.language(), "ca");
        assert_eq!(catalog.lookup("board"), "Placa");
        assert_eq!(catalog.lookup("blocks"), "Blocks");
        assert_eq!(catalog.lookup("limit"), "limit");
        assert_eq!(catalog.lookup("noSuchKey"), "noSuchKey");
    }

    #[test]
    fn format_substitutes_argument() {
        let catalog = MessageCatalog::english();
        assert_eq!(catalog.format1("DELETE_ALL_BLOCKS", 3), "Delete all 3 blocks?");
    }

    #[test]
    fn load_reads_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("es.toml"), "board = \"Placa\"\n").unwrap();
        let catalog = MessageCatalog::load("es", Some(dir.path())).unwrap();
        assert_eq!(catalog.lookup("board"), "Placa");

        let missing = MessageCatalog::load("ca", Some(dir.path())).unwrap();
        assert_eq!(missing.lookup("board"), "Board");
    }
}

//! Runtime settings.
//!
//! Precedence, lowest first: built-in defaults, an optional TOML file, then
//! `OPENAPI_TREE_*` environment variables (`__` separates nested keys).

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::Error;

pub const ENV_PREFIX: &str = "OPENAPI_TREE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Directory scanned for API description documents.
    pub input_dir: PathBuf,
    /// Overrides the server declared by each document.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// `tracing` filter directive used when `OPENAPI_TREE_LOG` is unset.
    pub log_level: String,
    /// Skip confirmation prompts for destructive actions.
    pub assume_yes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("apis"),
            base_url: None,
            api_key: None,
            log_level: "warn".to_owned(),
            assume_yes: false,
        }
    }
}

impl Settings {
    /// Load settings, reading `file` if given. A missing file is an error.
    pub fn load(file: Option<&Path>) -> Result<Self, Error> {
        let mut builder = builder_with_defaults()?;
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Settings::default();
    Config::builder()
        .set_default("input_dir", defaults.input_dir.to_string_lossy().into_owned())?
        .set_default("log_level", defaults.log_level)?
        .set_default("assume_yes", defaults.assume_yes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_apply_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.log_level, Settings::default().log_level);
        assert!(!settings.assume_yes);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "input_dir = \"/srv/apis\"\nbase_url = \"https://api.example.com\"\nassume_yes = true\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.input_dir, PathBuf::from("/srv/apis"));
        assert_eq!(settings.base_url.as_deref(), Some("https://api.example.com"));
        assert!(settings.assume_yes);
        assert_eq!(settings.api_key, None);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

//! Validated connector configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while building, loading or saving a [`ConnectorConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required field was empty or blank.
    #[error("Configuration field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// Failed to create the configuration directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read the configuration file.
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write the configuration file.
    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or fails validation.
    #[error("Failed to parse config file '{path}': {source}")]
    ParseJson {
        /// The path that could not be parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize the configuration.
    #[error("Failed to serialize config: {0}")]
    SerializeJson(#[from] serde_json::Error),
}

/// Connection settings for one device.
///
/// Client id and token are guaranteed non-empty. A blank device id is
/// treated as "no device filter".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConnectorConfig")]
pub struct ConnectorConfig {
    client_id: String,
    api_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
}

#[derive(Deserialize)]
struct RawConnectorConfig {
    client_id: String,
    api_token: String,
    #[serde(default)]
    device_id: Option<String>,
}

impl TryFrom<RawConnectorConfig> for ConnectorConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConnectorConfig) -> Result<Self, Self::Error> {
        Self::new(raw.client_id, raw.api_token, raw.device_id)
    }
}

impl ConnectorConfig {
    /// Creates a validated configuration.
    ///
    /// Surrounding whitespace is trimmed from every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyField`] if the client id or token is blank.
    pub fn new<S: Into<String>>(
        client_id: impl Into<String>,
        api_token: impl Into<String>,
        device_id: Option<S>,
    ) -> Result<Self, ConfigError> {
        let client_id = non_blank(client_id.into()).ok_or(ConfigError::EmptyField("client_id"))?;
        let api_token = non_blank(api_token.into()).ok_or(ConfigError::EmptyField("api_token"))?;
        let device_id = device_id.and_then(|id| non_blank(id.into()));
        Ok(Self {
            client_id,
            api_token,
            device_id,
        })
    }

    /// Returns the client (user) id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the API token.
    #[must_use]
    pub fn api_token(&self) -> &str {
        &self.api_token
    }

    /// Returns the requested device id, if any.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Saves the configuration as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("client_id", &self.client_id)
            .field("api_token", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_trims_and_validates() {
        let config = ConnectorConfig::new(" 1001 ", "tok", Some("42")).unwrap();
        assert_eq!(config.client_id(), "1001");
        assert_eq!(config.api_token(), "tok");
        assert_eq!(config.device_id(), Some("42"));
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert!(matches!(
            ConnectorConfig::new("", "tok", None::<String>),
            Err(ConfigError::EmptyField("client_id"))
        ));
        assert!(matches!(
            ConnectorConfig::new("1001", "   ", None::<String>),
            Err(ConfigError::EmptyField("api_token"))
        ));
    }

    #[test]
    fn test_blank_device_id_is_absent() {
        let config = ConnectorConfig::new("1001", "tok", Some("  ")).unwrap();
        assert_eq!(config.device_id(), None);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ConnectorConfig =
            serde_json::from_str(r#"{"client_id":"1","api_token":"t"}"#).unwrap();
        assert_eq!(ok.device_id(), None);

        let err = serde_json::from_str::<ConnectorConfig>(r#"{"client_id":"","api_token":"t"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let config = ConnectorConfig::new("1001", "tok", Some("42")).unwrap();

        config.save(&path).unwrap();
        let loaded = ConnectorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConnectorConfig::load(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ConnectorConfig::new("1001", "supersecret", None::<String>).unwrap();
        assert!(!format!("{config:?}").contains("supersecret"));
    }
}

//! Configuration resolution for the CLI.
//!
//! Values come from the JSON configuration file, overridden field by field
//! by command-line flags or `OIOT_*` environment variables.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use oiot_lib::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Credential fields given on the command line or in the environment.
#[derive(Default, Clone)]
pub(crate) struct Overrides {
    pub(crate) client_id: Option<String>,
    pub(crate) api_token: Option<String>,
    pub(crate) device_id: Option<String>,
}

impl Overrides {
    const fn is_complete(&self) -> bool {
        self.client_id.is_some() && self.api_token.is_some()
    }
}

/// Everything a command needs to reach the service.
#[derive(Clone)]
pub(crate) struct Settings {
    config_path: PathBuf,
    overrides: Overrides,
    client: ClientConfig,
    timeout: Duration,
}

impl Settings {
    pub(crate) fn new(
        config_path: Option<PathBuf>,
        overrides: Overrides,
        base_url: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let mut client = ClientConfig {
            timeout,
            ..Default::default()
        };
        if let Some(base_url) = base_url {
            client.base_url = base_url;
        }
        Self {
            config_path: config_path.unwrap_or_else(default_config_path),
            overrides,
            client,
            timeout,
        }
    }

    /// Path the configuration is read from and saved to.
    pub(crate) fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// HTTP client settings.
    pub(crate) const fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// Polling settings for the given interval.
    pub(crate) fn poll(&self, interval_secs: u64) -> PollConfig {
        PollConfig::default()
            .with_interval(Duration::from_secs(interval_secs.max(1)))
            .with_timeout(self.timeout)
    }

    /// Resolves the connector configuration.
    ///
    /// The file is optional when both the client id and the token are
    /// given as overrides.
    pub(crate) fn connector_config(&self) -> Result<ConnectorConfig> {
        let file = if self.config_path.exists() {
            Some(ConnectorConfig::load(&self.config_path)?)
        } else if self.overrides.is_complete() {
            None
        } else {
            bail!(
                "No configuration at {}; run `oiot setup` or pass --client-id and --api-token",
                self.config_path.display()
            );
        };
        merge(file.as_ref(), &self.overrides)
    }
}

/// Combines a configuration file with overrides; overrides win.
fn merge(file: Option<&ConnectorConfig>, overrides: &Overrides) -> Result<ConnectorConfig> {
    let client_id = overrides
        .client_id
        .clone()
        .or_else(|| file.map(|c| c.client_id().to_string()))
        .context("client id is not configured")?;
    let api_token = overrides
        .api_token
        .clone()
        .or_else(|| file.map(|c| c.api_token().to_string()))
        .context("API token is not configured")?;
    let device_id = overrides
        .device_id
        .clone()
        .or_else(|| file.and_then(|c| c.device_id().map(str::to_string)));

    Ok(ConnectorConfig::new(client_id, api_token, device_id)?)
}

/// Returns the default configuration file location.
///
/// - Linux: `~/.config/oiot/config.json`
/// - macOS: `~/Library/Application Support/oiot/config.json`
/// - Windows: `C:\Users\<User>\AppData\Roaming\oiot\config\config.json`
///
/// Falls back to `./oiot.json` if no home directory can be determined.
pub(crate) fn default_config_path() -> PathBuf {
    ProjectDirs::from("", "", "oiot").map_or_else(
        || PathBuf::from("oiot.json"),
        |dirs| dirs.config_dir().join("config.json"),
    )
}

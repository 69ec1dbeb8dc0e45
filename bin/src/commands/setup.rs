//! Interactive setup command.
//!
//! Prompts for credentials, verifies them against the service with an
//! initial refresh and saves the configuration for the other commands.

use crate::display;
use crate::settings::Settings;
use anyhow::{Context, Result, bail};
use inquire::{Password, PasswordDisplayMode, Text};
use oiot_lib::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Execute the setup command.
pub(crate) async fn setup(settings: &Settings) -> Result<()> {
    let existing = settings.connector_config().ok();
    let config = prompt(existing.as_ref())?;

    let connector = Connector::with_client_config(&config, settings.client().clone())?;
    let coordinator = match PollingCoordinator::setup(Arc::new(connector), settings.poll(10)).await
    {
        Ok(coordinator) => coordinator,
        Err(e) => {
            debug!(error = %e, "setup failed");
            bail!("{}", failure_message(&e));
        }
    };

    if let Some(kind) = coordinator.last_error() {
        warn!(error = %kind, "credentials accepted but the first reading failed");
    }

    // Keep the device the service resolved so later runs address it directly
    let device_id = coordinator
        .device_id()
        .or_else(|| config.device_id().map(str::to_string));
    let config = ConnectorConfig::new(config.client_id(), config.api_token(), device_id)?;
    config
        .save(settings.config_path())
        .with_context(|| format!("Failed to save {}", settings.config_path().display()))?;

    println!("Saved configuration to {}", settings.config_path().display());
    println!();
    display::print_view(&coordinator, &coordinator.view());
    Ok(())
}

fn prompt(existing: Option<&ConnectorConfig>) -> Result<ConnectorConfig> {
    let mut client_id = Text::new("Client ID:");
    if let Some(config) = existing {
        client_id = client_id.with_default(config.client_id());
    }
    let client_id = client_id.prompt()?;

    let api_token = Password::new("API token:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message(if existing.is_some() {
            "Leave empty to keep the saved token"
        } else {
            "Token from your OIOT account page"
        })
        .prompt()?;
    let api_token = match (api_token.trim().is_empty(), existing) {
        (true, Some(config)) => config.api_token().to_string(),
        _ => api_token,
    };

    let mut device_id =
        Text::new("Device ID:").with_help_message("Leave empty to use the first device");
    if let Some(id) = existing.and_then(ConnectorConfig::device_id) {
        device_id = device_id.with_default(id);
    }
    let device_id = device_id.prompt()?;

    Ok(ConnectorConfig::new(client_id, api_token, Some(device_id))?)
}

/// User-facing reason a setup attempt failed.
pub(crate) const fn failure_message(error: &OiotError) -> &'static str {
    match error.kind() {
        ErrorKind::CannotConnect => "Cannot connect to the OIOT service",
        ErrorKind::InvalidAuth => "Invalid authentication: check the client ID and token",
        ErrorKind::ParseError => "Unknown error: the service returned unexpected data",
    }
}

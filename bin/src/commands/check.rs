//! Credential check command.

use crate::settings::Settings;
use anyhow::{Result, bail};
use oiot_lib::prelude::*;

use super::connector;
use super::setup::failure_message;

/// Verify the configured credentials without fetching readings.
pub(crate) async fn check(settings: &Settings) -> Result<()> {
    let connector = connector(settings)?;
    let coordinator = PollingCoordinator::new(connector, settings.poll(10));

    if let Err(e) = coordinator.authenticate().await {
        bail!("{}: {}", failure_message(&e), e.reason());
    }

    let info = coordinator.device_info();
    println!("Credentials accepted");
    println!("Device: {} ({})", info.name, info.identifier);
    Ok(())
}

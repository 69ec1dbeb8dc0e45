//! CLI command implementations.

pub(crate) mod check;
pub(crate) mod fetch;
pub(crate) mod setup;
pub(crate) mod watch;

use crate::settings::Settings;
use anyhow::Result;
use oiot_lib::prelude::*;
use std::sync::Arc;

/// Builds a connector for the resolved configuration.
pub(crate) fn connector(settings: &Settings) -> Result<Arc<Connector>> {
    let config = settings.connector_config()?;
    let connector = Connector::with_client_config(&config, settings.client().clone())?;
    Ok(Arc::new(connector))
}

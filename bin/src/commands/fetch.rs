//! One-shot fetch command.

use crate::display::{self, Report};
use crate::settings::Settings;
use anyhow::{Result, bail};
use oiot_lib::prelude::*;

use super::connector;

/// Fetch the current readings once and print them.
pub(crate) async fn fetch(settings: &Settings, json: bool) -> Result<()> {
    let coordinator = PollingCoordinator::new(connector(settings)?, settings.poll(10));

    match coordinator.refresh().await {
        TickOutcome::Updated => {}
        TickOutcome::Failed(kind) => bail!("Fetch failed: {kind}"),
        TickOutcome::Skipped | TickOutcome::Halted => bail!("Fetch did not run"),
    }

    let view = coordinator.view();
    if json {
        println!("{}", Report::new(&coordinator, &view).to_json_line()?);
    } else {
        display::print_view(&coordinator, &view);
    }
    Ok(())
}

//! Watch command implementation.
//!
//! Registers the configured device with a [`DeviceRegistry`] and prints a
//! line whenever its readings or status change, until interrupted.

use crate::display::{self, Report};
use crate::settings::Settings;
use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use oiot_lib::prelude::*;
use tracing::{debug, info};

/// Execute the watch command.
pub(crate) async fn watch(
    settings: &Settings,
    interval: u64,
    count: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = settings.connector_config()?;
    let mut registry = DeviceRegistry::new(settings.client().clone(), settings.poll(interval));
    let coordinator = registry.register(&config).await?;

    let mut status = coordinator.subscribe();
    let mut last = None;
    let mut updates = 0usize;
    let mut rejected = false;

    info!(device = %coordinator.device_name(), interval, "watching");

    loop {
        let view = status.borrow_and_update().view();
        let key = Printed::of(&view);
        if last.as_ref() != Some(&key) {
            if json {
                println!("{}", Report::new(&coordinator, &view).to_json_line()?);
            } else {
                println!("{}", display::format_line(&view));
            }
            if matches!(view, SnapshotView::Fresh(_)) {
                updates += 1;
            }
            last = Some(key);
        }

        if matches!(view, SnapshotView::NeedsReauth) {
            rejected = true;
            break;
        }
        if count.is_some_and(|count| updates >= count) {
            break;
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }
    }

    for (key, reason) in registry.shutdown().await {
        debug!(%key, ?reason, "poll task stopped");
    }

    if rejected {
        bail!("Credentials rejected; run `oiot setup` to re-enter them");
    }
    Ok(())
}

/// What was last printed, so intermediate `Fetching` transitions are not
/// echoed.
#[derive(Debug, PartialEq, Eq)]
struct Printed {
    label: &'static str,
    fetched_at: Option<DateTime<Utc>>,
}

impl Printed {
    fn of(view: &SnapshotView) -> Self {
        Self {
            label: display::view_label(view),
            fetched_at: view.snapshot().map(|s| s.fetched_at()),
        }
    }
}

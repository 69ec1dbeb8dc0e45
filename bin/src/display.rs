//! Display utilities and output formatting for the oiot CLI.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use oiot_lib::Snapshot;
use oiot_lib::prelude::*;
use serde::Serialize;

/// One reading of a device, as printed by `fetch --json` and `watch --json`.
#[derive(Debug, Serialize)]
pub(crate) struct Report {
    device_id: Option<String>,
    device_name: String,
    status: &'static str,
    fetched_at: Option<DateTime<Utc>>,
    sensors: Vec<SensorInfo>,
}

impl Report {
    pub(crate) fn new(coordinator: &PollingCoordinator, view: &SnapshotView) -> Self {
        let device_id = coordinator.device_id();
        let snapshot = view.snapshot();
        let set = snapshot.map(|s| s.measurements());
        let sensors = Slot::ALL
            .iter()
            .map(|&slot| SensorInfo::describe(device_id.as_deref().unwrap_or_default(), slot, set))
            .collect();

        Self {
            device_id,
            device_name: coordinator.device_name(),
            status: view_label(view),
            fetched_at: snapshot.map(|s| s.fetched_at()),
            sensors,
        }
    }

    /// Serializes the report as a single JSON line.
    pub(crate) fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Short label for what a reader is shown.
pub(crate) const fn view_label(view: &SnapshotView) -> &'static str {
    match view {
        SnapshotView::Pending => "pending",
        SnapshotView::Fresh(_) => "fresh",
        SnapshotView::Stale(_) => "stale",
        SnapshotView::NeedsReauth => "needs_reauth",
    }
}

/// Prints device details and the readings of `view` as a table.
pub(crate) fn print_view(coordinator: &PollingCoordinator, view: &SnapshotView) {
    let info = coordinator.device_info();
    println!("Device:       {} ({})", info.name, info.identifier);
    println!("Manufacturer: {} {}", info.manufacturer, info.model);

    match view {
        SnapshotView::Pending => println!("No readings yet"),
        SnapshotView::NeedsReauth => {
            println!("Credentials rejected; run `oiot setup` to re-enter them");
        }
        SnapshotView::Fresh(snapshot) => print_snapshot(snapshot, false),
        SnapshotView::Stale(snapshot) => print_snapshot(snapshot, true),
    }
}

fn print_snapshot(snapshot: &Snapshot, stale: bool) {
    let fetched: DateTime<Local> = snapshot.fetched_at().into();
    let suffix = if stale { " (stale)" } else { "" };
    println!("Fetched:      {}{suffix}", fetched.format("%Y-%m-%d %H:%M:%S"));

    println!();
    println!("{:<6} {:<24} {:>14} {:<6}", "SLOT", "COUNTER", "VALUE", "UNIT");
    println!("{}", "-".repeat(53));
    for measurement in snapshot.measurements().iter() {
        println!("{}", format_row(measurement));
    }
}

fn format_row(measurement: &Measurement) -> String {
    format!(
        "{:<6} {:<24} {:>14.3} {:<6}",
        measurement.slot().number(),
        measurement.title(),
        measurement.value(),
        measurement.dimension()
    )
}

/// One-line summary used by `watch`.
pub(crate) fn format_line(view: &SnapshotView) -> String {
    let Some(snapshot) = view.snapshot() else {
        return format!("[{}]", view_label(view));
    };
    let fetched: DateTime<Local> = snapshot.fetched_at().into();
    let readings = snapshot
        .measurements()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} [{}] {readings}",
        fetched.format("%H:%M:%S"),
        view_label(view)
    )
}

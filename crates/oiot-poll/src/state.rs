//! Coordinator state and the snapshot readers observe.

use chrono::{DateTime, Utc};
use oiot_types::{ErrorKind, MeasurementSet};
use serde::Serialize;
use std::sync::Arc;

/// Why the coordinator is in its failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connection or parse failure; retried on the next tick.
    Transient,
    /// Credentials rejected; polling halted until re-authentication.
    Auth,
}

/// Lifecycle of a coordinator.
///
/// `Idle -> Fetching -> {Ready, Failed(Transient), Failed(Auth)}`, then back
/// to `Fetching` on the next tick except from `Failed(Auth)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "reason")]
pub enum CoordinatorState {
    /// No fetch attempted since (re-)authentication.
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed.
    Failed(FailureKind),
}

impl CoordinatorState {
    /// Returns true once authentication has been rejected.
    #[must_use]
    pub const fn is_auth_failed(&self) -> bool {
        matches!(self, Self::Failed(FailureKind::Auth))
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(FailureKind::Transient) => write!(f, "failed (transient)"),
            Self::Failed(FailureKind::Auth) => write!(f, "failed (authentication)"),
        }
    }
}

/// A successful fetch result together with the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    measurements: MeasurementSet,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot stamped with the current time.
    #[must_use]
    pub fn now(measurements: MeasurementSet) -> Self {
        Self {
            measurements,
            fetched_at: Utc::now(),
        }
    }

    /// Returns the readings.
    #[must_use]
    pub const fn measurements(&self) -> &MeasurementSet {
        &self.measurements
    }

    /// Returns when the readings were fetched.
    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// Everything a reader can learn about a coordinator, published atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct PollStatus {
    /// Last known-good snapshot.
    pub snapshot: Option<Arc<Snapshot>>,
    /// True if `snapshot` predates the most recent tick.
    pub stale: bool,
    /// Current lifecycle state.
    pub state: CoordinatorState,
    /// Kind of the most recent failure, cleared by a successful fetch.
    pub last_error: Option<ErrorKind>,
}

impl Default for PollStatus {
    fn default() -> Self {
        Self {
            snapshot: None,
            stale: false,
            state: CoordinatorState::Idle,
            last_error: None,
        }
    }
}

impl PollStatus {
    /// Returns the reader-facing view of this status.
    #[must_use]
    pub fn view(&self) -> SnapshotView {
        if self.state.is_auth_failed() {
            return SnapshotView::NeedsReauth;
        }
        match &self.snapshot {
            None => SnapshotView::Pending,
            Some(snapshot) if self.stale => SnapshotView::Stale(Arc::clone(snapshot)),
            Some(snapshot) => SnapshotView::Fresh(Arc::clone(snapshot)),
        }
    }
}

/// What a display consumer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotView {
    /// No readings have been fetched yet.
    Pending,
    /// Readings from the most recent tick.
    Fresh(Arc<Snapshot>),
    /// Last good readings, retained after a transient failure.
    Stale(Arc<Snapshot>),
    /// Credentials were rejected; readings are withheld until reconfiguration.
    NeedsReauth,
}

impl SnapshotView {
    /// Returns the snapshot if one may be displayed.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Fresh(snapshot) | Self::Stale(snapshot) => Some(snapshot),
            Self::Pending | Self::NeedsReauth => None,
        }
    }
}

/// Result of a single poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The cache was replaced with fresh readings.
    Updated,
    /// The fetch failed; the cache was left untouched.
    Failed(ErrorKind),
    /// Another fetch was already in flight.
    Skipped,
    /// Polling is halted by an earlier authentication failure.
    Halted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use oiot_types::{Measurement, Slot};

    fn snapshot() -> Arc<Snapshot> {
        let set = MeasurementSet::try_from_fn::<()>(|slot| {
            Ok(Measurement::new(slot, "c", f64::from(slot.number()), "m3"))
        })
        .unwrap();
        Arc::new(Snapshot::now(set))
    }

    #[test]
    fn test_default_status_is_pending() {
        let status = PollStatus::default();
        assert_eq!(status.state, CoordinatorState::Idle);
        assert_eq!(status.view(), SnapshotView::Pending);
    }

    #[test]
    fn test_view_fresh_and_stale() {
        let mut status = PollStatus {
            snapshot: Some(snapshot()),
            state: CoordinatorState::Ready,
            ..Default::default()
        };
        assert!(matches!(status.view(), SnapshotView::Fresh(_)));

        status.stale = true;
        status.state = CoordinatorState::Failed(FailureKind::Transient);
        let view = status.view();
        assert!(matches!(view, SnapshotView::Stale(_)));
        assert_eq!(
            view.snapshot().unwrap().measurements()[Slot::Two].value(),
            2.0
        );
    }

    #[test]
    fn test_auth_failure_withholds_snapshot() {
        let status = PollStatus {
            snapshot: Some(snapshot()),
            stale: true,
            state: CoordinatorState::Failed(FailureKind::Auth),
            last_error: Some(ErrorKind::InvalidAuth),
        };
        assert_eq!(status.view(), SnapshotView::NeedsReauth);
        assert!(status.view().snapshot().is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CoordinatorState::Ready.to_string(), "ready");
        assert_eq!(
            CoordinatorState::Failed(FailureKind::Auth).to_string(),
            "failed (authentication)"
        );
    }
}

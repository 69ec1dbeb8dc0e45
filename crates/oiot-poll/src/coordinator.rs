//! Scheduled single-flight polling of one device.

use crate::handle::{PollHandle, StopReason};
use crate::state::{CoordinatorState, FailureKind, PollStatus, Snapshot, SnapshotView, TickOutcome};
use oiot_fetch::MeterSource;
use oiot_types::{DeviceInfo, ErrorKind, OiotError, Result, SensorInfo, Slot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Scheduling configuration for a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Upper bound on a single fetch or authentication call.
    pub timeout: Duration,
}

impl PollConfig {
    /// Default tick interval (10 seconds).
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    /// Default fetch timeout (10 seconds).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Returns this configuration with a different tick interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns this configuration with a different fetch timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Polls one [`MeterSource`] and caches its latest readings.
///
/// The coordinator is the only writer of its [`PollStatus`]; readers take
/// cheap immutable copies through [`current_snapshot`](Self::current_snapshot),
/// [`view`](Self::view) or [`subscribe`](Self::subscribe) and never trigger or
/// wait for a fetch. At most one fetch is in flight at any time.
pub struct PollingCoordinator {
    source: Arc<dyn MeterSource>,
    config: PollConfig,
    in_flight: AtomicBool,
    authenticated: AtomicBool,
    status: watch::Sender<PollStatus>,
}

impl PollingCoordinator {
    /// Creates an idle coordinator. Nothing is fetched until the first tick.
    #[must_use]
    pub fn new(source: Arc<dyn MeterSource>, config: PollConfig) -> Self {
        let (status, _) = watch::channel(PollStatus::default());
        Self {
            source,
            config,
            in_flight: AtomicBool::new(false),
            authenticated: AtomicBool::new(false),
            status,
        }
    }

    /// Authenticates once, performs the initial refresh, and returns the
    /// coordinator ready to be [spawned](Self::spawn).
    ///
    /// A transient failure of the initial refresh is not fatal: the
    /// coordinator starts in `Failed(Transient)` without a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAuth` or `CannotConnect` if authentication fails, and
    /// `InvalidAuth` if the initial refresh is rejected.
    pub async fn setup(source: Arc<dyn MeterSource>, config: PollConfig) -> Result<Arc<Self>> {
        let coordinator = Arc::new(Self::new(source, config));
        coordinator.authenticate().await?;

        if let TickOutcome::Failed(ErrorKind::InvalidAuth) = coordinator.refresh().await {
            return Err(OiotError::InvalidAuth(
                "initial refresh was rejected".to_string(),
            ));
        }

        Ok(coordinator)
    }

    /// Returns the scheduling configuration.
    #[must_use]
    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Checks the credentials against the service, bounded by the timeout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAuth` if the credentials are rejected and
    /// `CannotConnect` on transport failure or timeout.
    pub async fn authenticate(&self) -> Result<()> {
        let result = match tokio::time::timeout(self.config.timeout, self.source.authenticate()).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(OiotError::InvalidAuth("credentials rejected".to_string())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self.timed_out()),
        };

        if let Err(e) = &result {
            if e.kind() == ErrorKind::InvalidAuth {
                error!(error = %e, "authentication failed");
                self.authenticated.store(false, Ordering::Release);
                self.status.send_modify(|status| {
                    status.state = CoordinatorState::Failed(FailureKind::Auth);
                    status.last_error = Some(ErrorKind::InvalidAuth);
                });
            }
        } else {
            info!(device = ?self.source.device_id(), "authenticated");
            self.authenticated.store(true, Ordering::Release);
        }

        result
    }

    /// Re-authenticates after an authentication failure so that polling
    /// may resume.
    ///
    /// On success a halted coordinator returns to `Idle`; a previously
    /// cached snapshot becomes visible again, marked stale until the next
    /// fetch. A coordinator that is not halted keeps its status untouched.
    ///
    /// # Errors
    ///
    /// Returns the authentication error; the coordinator stays halted.
    pub async fn reauthenticate(&self) -> Result<()> {
        self.authenticate().await?;
        self.status.send_if_modified(|status| {
            if !status.state.is_auth_failed() {
                return false;
            }
            status.state = CoordinatorState::Idle;
            status.last_error = None;
            status.stale = status.snapshot.is_some();
            true
        });
        Ok(())
    }

    /// Returns true once the credentials have been accepted and not
    /// rejected since.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Runs one tick: fetches under the timeout and updates the cache.
    ///
    /// Returns [`TickOutcome::Skipped`] without touching the network if a
    /// fetch is already in flight, and [`TickOutcome::Halted`] once
    /// authentication has failed.
    pub async fn refresh(&self) -> TickOutcome {
        if self.state().is_auth_failed() {
            return TickOutcome::Halted;
        }
        let Some(_flight) = FlightGuard::acquire(&self.in_flight) else {
            debug!("fetch already in flight, skipping tick");
            return TickOutcome::Skipped;
        };

        self.status
            .send_modify(|status| status.state = CoordinatorState::Fetching);

        let result = match tokio::time::timeout(self.config.timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        };

        match result {
            Ok(measurements) => {
                debug!(device = ?self.source.device_id(), "readings updated");
                let snapshot = Arc::new(Snapshot::now(measurements));
                self.status.send_modify(|status| {
                    status.snapshot = Some(snapshot);
                    status.stale = false;
                    status.state = CoordinatorState::Ready;
                    status.last_error = None;
                });
                TickOutcome::Updated
            }
            Err(e) if e.kind().is_transient() => {
                warn!(error = %e, "fetch failed, keeping previous readings");
                self.status.send_modify(|status| {
                    status.stale = status.snapshot.is_some();
                    status.state = CoordinatorState::Failed(FailureKind::Transient);
                    status.last_error = Some(e.kind());
                });
                TickOutcome::Failed(e.kind())
            }
            Err(e) => {
                error!(error = %e, "fetch rejected, polling halted until re-authentication");
                self.authenticated.store(false, Ordering::Release);
                self.status.send_modify(|status| {
                    status.state = CoordinatorState::Failed(FailureKind::Auth);
                    status.last_error = Some(ErrorKind::InvalidAuth);
                });
                TickOutcome::Failed(ErrorKind::InvalidAuth)
            }
        }
    }

    /// Starts the periodic poll task.
    ///
    /// The first tick fires one interval from now. Ticks that would land
    /// while a fetch is still running are skipped. The task ends when the
    /// handle is cancelled or dropped, or after an authentication failure.
    ///
    /// Scheduling requires a successful [`authenticate`](Self::authenticate)
    /// first; otherwise the task ends immediately with
    /// [`StopReason::Unauthenticated`] without fetching.
    #[must_use = "dropping the handle stops polling"]
    pub fn spawn(self: &Arc<Self>) -> PollHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let coordinator = Arc::clone(self);
        let interval = self.config.interval;
        let authenticated = self.is_authenticated();
        if !authenticated {
            warn!("not authenticated, refusing to schedule polling");
        }

        let task = tokio::spawn(async move {
            if !authenticated {
                return StopReason::Unauthenticated;
            }
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("poll task cancelled");
                        return StopReason::Cancelled;
                    }
                    _ = ticker.tick() => {}
                }

                match coordinator.refresh().await {
                    TickOutcome::Failed(ErrorKind::InvalidAuth) | TickOutcome::Halted => {
                        return StopReason::AuthFailed;
                    }
                    TickOutcome::Updated | TickOutcome::Failed(_) | TickOutcome::Skipped => {}
                }
            }
        });

        PollHandle::new(shutdown_tx, task)
    }

    /// Returns the latest readings, or `None` if there are none or the
    /// credentials have been rejected.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.view().snapshot().cloned()
    }

    /// Returns true if the cached readings predate the most recent tick.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.status.borrow().stale
    }

    /// Returns the kind of the most recent failure, if the last tick failed.
    #[must_use]
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.status.borrow().last_error
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.status.borrow().state
    }

    /// Returns a copy of the full status.
    #[must_use]
    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    /// Returns what a display consumer should show.
    #[must_use]
    pub fn view(&self) -> SnapshotView {
        self.status.borrow().view()
    }

    /// Returns a receiver that is notified after every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.status.subscribe()
    }

    /// Returns the device id reported by the source.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        self.source.device_id()
    }

    /// Returns the device name reported by the source.
    #[must_use]
    pub fn device_name(&self) -> String {
        self.source.device_name()
    }

    /// Returns the device description for display consumers.
    #[must_use]
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(self.device_id().unwrap_or_default(), self.device_name())
    }

    /// Describes both counter sensors using the current readings.
    #[must_use]
    pub fn sensors(&self) -> [SensorInfo; 2] {
        let device_id = self.device_id().unwrap_or_default();
        let snapshot = self.current_snapshot();
        let set = snapshot.as_deref().map(Snapshot::measurements);
        Slot::ALL.map(|slot| SensorInfo::describe(&device_id, slot, set))
    }

    fn timed_out(&self) -> OiotError {
        OiotError::CannotConnect(format!("no response within {:?}", self.config.timeout))
    }
}

impl std::fmt::Debug for PollingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingCoordinator")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

/// Holds the in-flight flag for the duration of one fetch.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

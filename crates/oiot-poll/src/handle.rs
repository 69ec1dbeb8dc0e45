//! Cancellation handle for a running poll task.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Why a poll task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The handle was cancelled.
    Cancelled,
    /// The service rejected the credentials.
    AuthFailed,
    /// Polling was started before the credentials were accepted.
    Unauthenticated,
    /// The task panicked or was aborted by the runtime.
    Aborted,
}

/// Handle to a running poll task.
///
/// Dropping the handle stops the task at its next wake-up.
#[derive(Debug)]
pub struct PollHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<StopReason>,
}

impl PollHandle {
    pub(crate) const fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<StopReason>) -> Self {
        Self { shutdown, task }
    }

    /// Returns true once the task has stopped on its own or been cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the task and waits for it to finish.
    ///
    /// A fetch already in flight is allowed to complete (it is bounded by
    /// the poll timeout). Returns the reason the task ended, which may be
    /// [`StopReason::AuthFailed`] if it had already stopped.
    pub async fn cancel(self) -> StopReason {
        let _ = self.shutdown.send(());
        join(self.task).await
    }

    /// Waits for the task to stop on its own.
    pub async fn stopped(self) -> StopReason {
        let Self { shutdown, task } = self;
        let reason = join(task).await;
        drop(shutdown);
        reason
    }
}

async fn join(task: JoinHandle<StopReason>) -> StopReason {
    task.await.unwrap_or(StopReason::Aborted)
}

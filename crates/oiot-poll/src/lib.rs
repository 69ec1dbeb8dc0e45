//! Polling coordinator and device registry for the OIOT meter reader.
//!
//! This crate turns a [`MeterSource`](oiot_fetch::MeterSource) into a
//! cached, periodically refreshed snapshot:
//!
//! - [`PollingCoordinator`] - Single-flight polling with a stale-but-available cache
//! - [`PollConfig`] - Tick interval and fetch timeout
//! - [`PollStatus`] / [`SnapshotView`] - What readers observe
//! - [`PollHandle`] - Cancellation handle for the periodic task
//! - [`DeviceRegistry`] - Owns one coordinator per configured device

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod coordinator;
mod handle;
mod registry;
mod state;

pub use coordinator::{PollConfig, PollingCoordinator};
pub use handle::{PollHandle, StopReason};
pub use registry::{DeviceKey, DeviceRegistry, RegistryError};
pub use state::{CoordinatorState, FailureKind, PollStatus, Snapshot, SnapshotView, TickOutcome};

//! Poll an OIOT metering device and expose its counters as a cached snapshot.
//!
//! This is a facade crate that re-exports functionality from the oiot
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use oiot_lib::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectorConfig::new("1001", "token", Some("42"))?;
//!     let connector = Arc::new(Connector::new(&config)?);
//!
//!     let coordinator = PollingCoordinator::setup(connector, PollConfig::default()).await?;
//!     let handle = coordinator.spawn();
//!
//!     if let Some(snapshot) = coordinator.current_snapshot() {
//!         for measurement in snapshot.measurements().iter() {
//!             println!("{measurement}");
//!         }
//!     }
//!
//!     handle.cancel().await;
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use oiot_types::*;

// Re-export the connector
#[cfg(feature = "fetch")]
pub use oiot_fetch::{
    ClientConfig, Connector, MeterSource, ParsedPayload, PayloadError, classify_body,
    parse_payload, url,
};

// Re-export polling
#[cfg(feature = "poll")]
pub use oiot_poll::{
    CoordinatorState, DeviceKey, DeviceRegistry, FailureKind, PollConfig, PollHandle, PollStatus,
    PollingCoordinator, RegistryError, Snapshot, SnapshotView, StopReason, TickOutcome,
};

/// Prelude module for convenient imports.
///
/// ```
/// use oiot_lib::prelude::*;
/// ```
pub mod prelude {
    pub use oiot_types::{
        ConfigError, ConnectorConfig, DeviceInfo, ErrorKind, Measurement, MeasurementSet,
        OiotError, Result, SensorInfo, Slot,
    };

    #[cfg(feature = "fetch")]
    pub use oiot_fetch::{ClientConfig, Connector, MeterSource};

    #[cfg(feature = "poll")]
    pub use oiot_poll::{
        CoordinatorState, DeviceKey, DeviceRegistry, PollConfig, PollHandle, PollingCoordinator,
        SnapshotView, StopReason, TickOutcome,
    };
}

//! The seam between pollers and connectors.

use async_trait::async_trait;
use oiot_types::{MeasurementSet, Result};

/// Something that can authenticate against the metering service and
/// fetch the current readings of one device.
///
/// [`crate::Connector`] is the HTTP implementation; pollers only depend on
/// this trait so they can be driven by in-memory sources in tests.
#[async_trait]
pub trait MeterSource: Send + Sync {
    /// Checks the credentials against the service.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidAuth` or `CannotConnect`.
    async fn authenticate(&self) -> Result<bool>;

    /// Fetches the latest readings.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidAuth`, `CannotConnect` or `ParseError`.
    async fn fetch(&self) -> Result<MeasurementSet>;

    /// Returns the device id, once known.
    fn device_id(&self) -> Option<String>;

    /// Returns the device name; empty until the first successful call.
    fn device_name(&self) -> String;
}

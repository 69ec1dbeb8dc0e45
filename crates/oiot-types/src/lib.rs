//! Core types for the OIOT meter reader.
//!
//! This crate provides the fundamental data structures used throughout oiot:
//!
//! - [`Slot`] - Which of the two device counters a reading belongs to
//! - [`Measurement`] - A single named counter reading with its unit
//! - [`MeasurementSet`] - The complete two-slot snapshot produced by one fetch
//! - [`DeviceIdentity`] - Credentials and the (refinable) device id and name
//! - [`ConnectorConfig`] - Validated connection settings
//! - [`OiotError`] / [`ErrorKind`] - The connector error taxonomy

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod device;
mod error;
mod measurement;

pub use config::{ConfigError, ConnectorConfig};
pub use device::{DeviceIdentity, DeviceInfo, SensorInfo};
pub use error::{ErrorKind, OiotError, Result};
pub use measurement::{Measurement, MeasurementSet, Slot};

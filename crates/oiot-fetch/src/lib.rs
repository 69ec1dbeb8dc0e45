//! HTTP connector and payload parsing for the OIOT meter reader.
//!
//! This crate provides the device-reading pipeline:
//!
//! - [`url::site_url`] - Builds the device data URL
//! - [`Connector`] - Authenticates and fetches readings for one device
//! - [`classify_body`] - Maps a raw response body onto the error taxonomy
//! - [`parse_payload`] - Converts a successful payload into measurements
//! - [`MeterSource`] - The seam pollers use to drive a connector

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod parse;
mod source;
pub mod url;

pub use client::{ClientConfig, Connector, classify_body};
pub use parse::{ParsedPayload, PayloadError, parse_payload};
pub use source::MeterSource;

//! Device payload parsing.

use oiot_types::{Measurement, MeasurementSet, OiotError};
use serde_json::Value;
use thiserror::Error;

const RESULT: &str = "result";
const TITLE: &str = "TITLE";
const DATA: &str = "data";

/// Errors that can occur while parsing a successful payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload has no `result` mapping.
    #[error("payload has no 'result' object")]
    MissingResult,

    /// The `result` mapping holds no devices.
    #[error("payload 'result' is empty")]
    EmptyResult,

    /// The device record is not a JSON object.
    #[error("device '{0}' record is not an object")]
    InvalidRecord(String),

    /// The device record has no readings.
    #[error("device '{0}' has no readings")]
    EmptyData(String),

    /// A required field is absent or has the wrong type.
    #[error("device '{device_id}' is missing field '{field}'")]
    MissingField {
        /// Device whose record is incomplete.
        device_id: String,
        /// Name of the missing field.
        field: String,
    },
}

impl From<PayloadError> for OiotError {
    fn from(err: PayloadError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Outcome of parsing one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPayload {
    /// Canonical device id: the first key under `result`.
    pub device_id: String,
    /// Device title.
    pub device_name: String,
    /// Readings for both counters.
    pub measurements: MeasurementSet,
}

/// Parses a successful device payload.
///
/// The device is the first entry of `result` in received order. Only the
/// first (most recent) entry of its `data` sequence is read. For each slot
/// `n` the title comes from `COUNTER_NAME_n`, the unit from `MEASURE_n_NAME`
/// and the value from `data[0].counter_n`.
///
/// # Errors
///
/// Returns an error if `result` is missing or empty, or if the device
/// record lacks its title, readings, or any per-slot field.
pub fn parse_payload(payload: &Value) -> Result<ParsedPayload, PayloadError> {
    let result = payload.get(RESULT).ok_or(PayloadError::MissingResult)?;
    let (device_id, record) = match result {
        Value::Object(devices) => devices.iter().next().ok_or(PayloadError::EmptyResult)?,
        // Empty PHP arrays encode as `[]`.
        Value::Array(items) if items.is_empty() => return Err(PayloadError::EmptyResult),
        _ => return Err(PayloadError::MissingResult),
    };
    let record = record
        .as_object()
        .ok_or_else(|| PayloadError::InvalidRecord(device_id.clone()))?;

    let missing = |field: &str| PayloadError::MissingField {
        device_id: device_id.clone(),
        field: field.to_string(),
    };

    let device_name = record.get(TITLE).and_then(text).ok_or_else(|| missing(TITLE))?;

    let latest = record
        .get(DATA)
        .and_then(Value::as_array)
        .ok_or_else(|| missing(DATA))?
        .first()
        .ok_or_else(|| PayloadError::EmptyData(device_id.clone()))?;

    let measurements = MeasurementSet::try_from_fn(|slot| {
        let title_key = format!("COUNTER_NAME_{slot}");
        let unit_key = format!("MEASURE_{slot}_NAME");
        let value_key = format!("counter_{slot}");

        let title = record.get(&title_key).and_then(text).ok_or_else(|| missing(&title_key))?;
        let dimension = record.get(&unit_key).and_then(text).ok_or_else(|| missing(&unit_key))?;
        let value = latest
            .get(&value_key)
            .and_then(number)
            .ok_or_else(|| missing(&format!("{DATA}[0].{value_key}")))?;

        Ok(Measurement::new(slot, title, value, dimension))
    })?;

    Ok(ParsedPayload {
        device_id: device_id.clone(),
        device_name,
        measurements,
    })
}

/// Reads a string field, accepting bare numbers as their decimal text.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a numeric field, accepting numeric strings such as `"12.500"`.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

//! Counter readings.

use serde::{Deserialize, Serialize};

/// Fixed index identifying one of the device's two counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Slot {
    /// Counter 1 (`COUNTER_NAME_1`, `MEASURE_1_NAME`, `counter_1`).
    One,
    /// Counter 2 (`COUNTER_NAME_2`, `MEASURE_2_NAME`, `counter_2`).
    Two,
}

impl Slot {
    /// Both slots in ascending order.
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    /// Returns the 1-based slot number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("invalid slot {other}, expected 1 or 2")),
        }
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.number()
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A single named counter reading with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    slot: Slot,
    title: String,
    value: f64,
    dimension: String,
}

impl Measurement {
    /// Creates a new measurement.
    #[must_use]
    pub fn new(slot: Slot, title: impl Into<String>, value: f64, dimension: impl Into<String>) -> Self {
        Self {
            slot,
            title: title.into(),
            value,
            dimension: dimension.into(),
        }
    }

    /// Returns the counter slot.
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Returns the counter title (e.g. "Cold").
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the counter value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Returns the unit of the value (e.g. "m3").
    #[must_use]
    pub fn dimension(&self) -> &str {
        &self.dimension
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} {}", self.title, self.value, self.dimension)
    }
}

/// The two-slot snapshot produced by one successful fetch.
///
/// A set always holds both counters; there is no way to build a partial one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    one: Measurement,
    two: Measurement,
}

impl MeasurementSet {
    /// Builds a set by producing the measurement for each slot in turn.
    ///
    /// Stops at the first error, so a failure never yields a partial set.
    /// Each measurement is stored under the slot it was produced for,
    /// whatever slot `f` stamped on it.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_from_fn<E>(mut f: impl FnMut(Slot) -> Result<Measurement, E>) -> Result<Self, E> {
        let mut produce = |slot| {
            f(slot).map(|mut measurement: Measurement| {
                measurement.slot = slot;
                measurement
            })
        };
        let one = produce(Slot::One)?;
        let two = produce(Slot::Two)?;
        Ok(Self { one, two })
    }

    /// Returns the measurement for `slot`.
    #[must_use]
    pub const fn get(&self, slot: Slot) -> &Measurement {
        match slot {
            Slot::One => &self.one,
            Slot::Two => &self.two,
        }
    }

    /// Iterates over both measurements in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        [&self.one, &self.two].into_iter()
    }

    /// Always 2.
    #[must_use]
    pub const fn len(&self) -> usize {
        2
    }

    /// Always false; present for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl std::ops::Index<Slot> for MeasurementSet {
    type Output = Measurement;

    fn index(&self, slot: Slot) -> &Self::Output {
        self.get(slot)
    }
}

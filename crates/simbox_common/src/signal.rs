//! Signal timelines parsed from a waveform dump.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Signal name to timeline, ordered by name for stable output.
pub type SignalMap = BTreeMap<String, Signal>;

/// One value change of a signal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueChange {
    /// Simulation time in dump time units.
    pub time: u64,
    /// The new value, one character per bit from `0 1 x z`, MSB first.
    pub val: String,
}

impl ValueChange {
    /// Creates a value change.
    pub fn new(time: u64, val: impl Into<String>) -> Self {
        Self {
            time,
            val: val.into(),
        }
    }
}

/// A signal's declared width and its ordered value changes.
///
/// `values` is sorted non-decreasing by time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Declared bit width.
    pub width: u32,
    /// Value changes in time order.
    pub values: Vec<ValueChange>,
}

impl Signal {
    /// Creates a signal with no recorded values.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            values: Vec::new(),
        }
    }

    /// Returns the value in effect at `time`, if any change happened at or before it.
    pub fn value_at(&self, time: u64) -> Option<&str> {
        let idx = self.values.partition_point(|v| v.time <= time);
        idx.checked_sub(1).map(|i| self.values[i].val.as_str())
    }
}

use std::fmt;

use crate::error::{Error, Result};

/// Storage for a single model weight
///
/// `time` is the logical clock of the owning model: the number of training
/// instances processed so far.
pub trait Weight: Default + Clone + fmt::Debug {
    /// Whether `finalize` replaces the value with a time average
    const AVERAGED: bool;

    /// Current value used for scoring
    fn get(&self) -> f64;

    /// Add `delta` to the weight at logical time `time`
    fn update(&mut self, delta: f64, time: u64);

    /// Prepare the weight for inference at logical time `time`
    fn finalize(&mut self, time: u64) -> Result<()>;

    /// Rebuild an inference-ready weight from a persisted value
    fn from_value(value: f64) -> Self;
}

/// Plain weights are their own value; finalizing is a no-op.
impl Weight for f64 {
    const AVERAGED: bool = false;

    #[inline]
    fn get(&self) -> f64 {
        *self
    }

    #[inline]
    fn update(&mut self, delta: f64, _time: u64) {
        *self += delta;
    }

    fn finalize(&mut self, _time: u64) -> Result<()> {
        Ok(())
    }

    fn from_value(value: f64) -> Self {
        value
    }
}

/// A weight whose time-averaged trajectory is computed lazily
///
/// Alongside the current value the weight keeps the sum of all values it
/// held up to `timestamp`. Elapsed time is folded into the sum only when the
/// weight is written, so maintaining the average costs O(1) per update no
/// matter how long the weight sat untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LazyWeight {
    /// Current weight
    value: f64,
    /// Sum of the weight over `[0, timestamp)`
    summed: f64,
    /// Time of the last fold
    timestamp: u64,
}

impl LazyWeight {
    /// Current (instantaneous or, once averaged, the averaged) value
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Running sum as of the last fold
    pub fn summed(&self) -> f64 {
        self.summed
    }

    /// Time of the last fold
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Bring the running sum up to `time`
    pub fn fold(&mut self, time: u64) {
        debug_assert!(time >= self.timestamp, "logical time went backwards");
        self.summed += (time - self.timestamp) as f64 * self.value;
        self.timestamp = time;
    }

    /// Replace the current value with the mean over `[0, time)`
    pub fn average(&mut self, time: u64) -> Result<()> {
        if time == 0 {
            return Err(Error::DegenerateModel);
        }
        self.fold(time);
        self.value = self.summed / time as f64;
        Ok(())
    }
}

impl Weight for LazyWeight {
    const AVERAGED: bool = true;

    #[inline]
    fn get(&self) -> f64 {
        self.value
    }

    fn update(&mut self, delta: f64, time: u64) {
        self.fold(time);
        self.value += delta;
    }

    fn finalize(&mut self, time: u64) -> Result<()> {
        self.average(time)
    }

    fn from_value(value: f64) -> Self {
        Self {
            value,
            summed: 0.0,
            timestamp: 0,
        }
    }
}

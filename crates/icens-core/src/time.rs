//! Simulated time
//!
//! Scenario files express times in seconds, but ordering must be exact, so
//! time is stored as integer nanoseconds. Time only advances when the
//! scheduler dispatches an event.

use serde::{Deserialize, Serialize};

use crate::error::FrequencyError;
use crate::types::Frequency;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point on the simulated timeline (nanoseconds since simulation start)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Simulation start
    pub const ZERO: SimTime = SimTime(0);

    /// Create from raw nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Create from whole milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Create from whole seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * NANOS_PER_SEC)
    }

    /// Create from fractional seconds, rounded to the nearest nanosecond
    ///
    /// Returns `None` for negative, NaN or out-of-range values.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let nanos = (secs * NANOS_PER_SEC as f64).round();
        if nanos > u64::MAX as f64 {
            return None;
        }
        Some(Self(nanos as u64))
    }

    /// Raw nanoseconds
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Seconds as a float (for display and reports)
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// `self + nanos`, `None` on overflow
    pub fn checked_add_nanos(self, nanos: u64) -> Option<Self> {
        self.0.checked_add(nanos).map(Self)
    }

    /// Time of the next emission at `frequency`, i.e. `self + 1/frequency`
    ///
    /// The period is never shorter than one nanosecond so an emitter always
    /// makes progress.
    pub fn after_period(self, frequency: Frequency) -> Result<Self, FrequencyError> {
        let period = frequency.period_nanos();
        self.checked_add_nanos(period)
            .ok_or(FrequencyError::PeriodOverflow { hz: frequency.hz() })
    }

    /// Nanoseconds elapsed since `earlier`, `None` if `earlier` is later
    pub fn duration_since(self, earlier: SimTime) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs_f64_rounds_to_nanos() {
        assert_eq!(SimTime::from_secs_f64(12.001).unwrap(), SimTime::from_millis(12_001));
        assert_eq!(SimTime::from_secs_f64(0.0).unwrap(), SimTime::ZERO);
    }

    #[test]
    fn test_from_secs_f64_rejects_invalid() {
        assert!(SimTime::from_secs_f64(-1.0).is_none());
        assert!(SimTime::from_secs_f64(f64::NAN).is_none());
        assert!(SimTime::from_secs_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn test_after_period() {
        let t = SimTime::from_secs(5);
        let rate = Frequency::new(4.0).unwrap();
        assert_eq!(t.after_period(rate).unwrap(), SimTime::from_millis(5_250));
    }

    #[test]
    fn test_ordering_and_duration() {
        let a = SimTime::from_millis(12_000);
        let b = SimTime::from_millis(12_001);
        assert!(a < b);
        assert_eq!(b.duration_since(a), Some(1_000_000));
        assert_eq!(a.duration_since(b), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SimTime::from_millis(12_001).to_string(), "12.001s");
    }
}

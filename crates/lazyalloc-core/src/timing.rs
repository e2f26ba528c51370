//! Per-trial timing samples.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::strategy::AllocationStrategy;

/// Phase timings of one trial, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTimes {
    pub strategy: AllocationStrategy,
    /// Allocation, including the touch pass for the touched strategy.
    pub init: f64,
    pub first_write: f64,
    pub second_write: f64,
    /// Sanity write; present when the run is configured for it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub third_write: Option<f64>,
}

impl BenchmarkTimes {
    #[must_use]
    pub const fn new(
        strategy: AllocationStrategy,
        init: f64,
        first_write: f64,
        second_write: f64,
    ) -> Self {
        Self {
            strategy,
            init,
            first_write,
            second_write,
            third_write: None,
        }
    }

    #[must_use]
    pub const fn with_third_write(mut self, third_write: f64) -> Self {
        self.third_write = Some(third_write);
        self
    }

    /// `init + first_write`.
    ///
    /// Unreliable across trials of one process: freed memory may still be
    /// resident when the next strategy allocates.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.init + self.first_write
    }

    /// Relative difference between the second and third write, when measured.
    #[must_use]
    pub fn sanity_drift(&self) -> Option<f64> {
        self.third_write
            .map(|third| relative_difference(self.second_write, third))
    }
}

/// Symmetric relative difference `|a - b| / mean(a, b)`.
///
/// Two zero samples are identical (0.0); one zero sample against a positive one
/// is a full 2.0 difference.
#[must_use]
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let mean = (a + b) / 2.0;
    if mean == 0.0 {
        return 0.0;
    }
    (a - b).abs() / mean
}

#[must_use]
pub fn micros(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000_000.0
}

/// Run `f` once on the calling thread and return its result with the elapsed microseconds.
pub fn time_phase<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();
    (value, micros(elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_init_plus_first_write() {
        let t = BenchmarkTimes::new(AllocationStrategy::Plain, 10.0, 90.0, 40.0);
        assert!((t.total() - 100.0).abs() < f64::EPSILON);
        assert_eq!(t.sanity_drift(), None);
    }

    #[test]
    fn relative_difference_uses_mean_denominator() {
        assert!((relative_difference(150.0, 50.0) - 1.0).abs() < 1e-12);
        let near = relative_difference(100.0, 98.0);
        assert!(near > 0.02 && near < 0.0203, "got {near}");
        assert_eq!(relative_difference(0.0, 0.0), 0.0);
        assert!((relative_difference(0.0, 5.0) - 2.0).abs() < 1e-12);
        assert_eq!(relative_difference(3.0, 5.0), relative_difference(5.0, 3.0));
    }

    #[test]
    fn sanity_drift_compares_second_and_third() {
        let t = BenchmarkTimes::new(AllocationStrategy::Touched, 1.0, 50.0, 50.0)
            .with_third_write(55.0);
        let drift = t.sanity_drift().unwrap();
        assert!((drift - 5.0 / 52.5).abs() < 1e-12);
    }

    #[test]
    fn time_phase_returns_value_and_non_negative_duration() {
        let (value, us) = time_phase(|| 21 * 2);
        assert_eq!(value, 42);
        assert!(us >= 0.0);
    }

    #[test]
    fn micros_converts_durations() {
        assert!((micros(Duration::from_millis(3)) - 3_000.0).abs() < 1e-9);
        assert!((micros(Duration::from_nanos(1_500)) - 1.5).abs() < 1e-9);
    }
}

//! Streaming mean/standard-deviation accumulator
//!
//! Welford's online algorithm: O(1) memory and O(1) work per sample, which
//! matters because the comparator feeds one value per enumerated combination
//! and the number of combinations grows as S^V.

use serde::{Deserialize, Serialize};

/// Online accumulator for count, mean and variance.
///
/// # Example
///
/// ```
/// use histaug::running_stats::RunningStats;
///
/// let mut stats = RunningStats::new();
/// for x in [1.0, 2.0, 3.0, 4.0] {
///     stats.update(x);
/// }
/// let snapshot = stats.compute();
/// assert!((snapshot.mean - 2.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the current mean.
    m2: f64,
}

/// Mean and standard deviation of everything fed to a [`RunningStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub mean: f64,
    pub std: f64,
}

impl StatsSnapshot {
    /// Placeholder for a value that received no samples.
    pub fn missing() -> Self {
        Self {
            mean: f64::NAN,
            std: f64::NAN,
        }
    }

    /// True when either field is NaN.
    pub fn is_missing(&self) -> bool {
        self.mean.is_nan() || self.std.is_nan()
    }
}

impl RunningStats {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of samples seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Population variance (divide by n). NaN when empty.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        (self.m2 / self.count as f64).max(0.0)
    }

    /// Snapshot of mean and population standard deviation.
    ///
    /// The comparator enumerates the whole deficit distribution rather than
    /// sampling it, so the population estimator is the exact one.
    pub fn compute(&self) -> StatsSnapshot {
        if self.count == 0 {
            return StatsSnapshot::missing();
        }
        StatsSnapshot {
            mean: self.mean,
            std: self.variance().sqrt(),
        }
    }
}

use std::ops::Range;

use thiserror::Error;

/// Error returned when constructing an invalid [`TimeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeSetError {
    #[error("time set must contain at least one point")]
    Empty,
    #[error("time point {0} is not finite")]
    NotFinite(f64),
    #[error("time points must be strictly increasing: {previous} then {next}")]
    NotIncreasing { previous: f64, next: f64 },
}

/// The ordered time points over which a model is indexed.
///
/// Time-indexed families are keyed by position in this set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TimeSet {
    points: Vec<f64>,
}

impl TimeSet {
    /// A single point at `t = 0`.
    #[must_use]
    pub fn steady_state() -> Self {
        Self { points: vec![0.0] }
    }

    /// Creates a time set from strictly increasing, finite points.
    ///
    /// # Errors
    ///
    /// Returns an error if `points` is empty, contains a non-finite value,
    /// or is not strictly increasing.
    pub fn new(points: Vec<f64>) -> Result<Self, TimeSetError> {
        if points.is_empty() {
            return Err(TimeSetError::Empty);
        }
        if let Some(&bad) = points.iter().find(|t| !t.is_finite()) {
            return Err(TimeSetError::NotFinite(bad));
        }
        if let Some(pair) = points.windows(2).find(|w| w[1] <= w[0]) {
            return Err(TimeSetError::NotIncreasing {
                previous: pair[0],
                next: pair[1],
            });
        }
        Ok(Self { points })
    }

    /// Position of the first time point.
    #[must_use]
    pub fn first(&self) -> usize {
        0
    }

    #[must_use]
    pub fn indices(&self) -> Range<usize> {
        0..self.points.len()
    }

    /// Returns the time value at position `t`.
    #[must_use]
    pub fn point(&self, t: usize) -> Option<f64> {
        self.points.get(t).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for TimeSet {
    fn default() -> Self {
        Self::steady_state()
    }
}

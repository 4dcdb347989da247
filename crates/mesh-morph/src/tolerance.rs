//! Tolerance context shared by every engine.
//!
//! A [`Tolerance`] is passed by reference and never mutated. It supplies the
//! absolute model tolerance (welding distance, identity checks, convergence
//! scale) and the much smaller zero threshold used to decide when a length or
//! volume is numerically zero.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{MorphError, MorphResult};

/// Default absolute model tolerance.
pub const DEFAULT_ABSOLUTE_TOLERANCE: f64 = 1e-6;

/// Default zero threshold (2^-32).
pub const DEFAULT_ZERO_THRESHOLD: f64 = 2.328_306_436_538_696_3e-10;

/// Numeric tolerance context.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct Tolerance {
    /// Absolute model tolerance in model units.
    pub absolute: f64,

    /// Lengths, areas and volumes at or below this are treated as zero.
    pub zero: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: DEFAULT_ABSOLUTE_TOLERANCE,
            zero: DEFAULT_ZERO_THRESHOLD,
        }
    }
}

impl Tolerance {
    /// Tolerance with the given absolute value and the default zero threshold.
    pub fn new(absolute: f64) -> Self {
        Self {
            absolute,
            ..Self::default()
        }
    }

    /// Set the zero threshold.
    pub fn with_zero(mut self, zero: f64) -> Self {
        self.zero = zero;
        self
    }

    #[inline]
    pub fn zero_threshold(&self) -> f64 {
        self.zero
    }

    /// True if `value` is at or below the zero threshold in magnitude.
    #[inline]
    pub fn is_zero(&self, value: f64) -> bool {
        value.abs() <= self.zero
    }

    /// RMS displacement below which an iterative process counts as converged.
    #[inline]
    pub fn convergence_threshold(&self, multiplier: f64) -> f64 {
        self.absolute * multiplier
    }

    /// Reject non-finite or non-positive values.
    pub fn validate(&self) -> MorphResult<()> {
        if !(self.absolute.is_finite() && self.absolute > 0.0) {
            return Err(MorphError::invalid_parameter(
                "tolerance.absolute",
                format!("must be finite and positive, got {}", self.absolute),
            ));
        }
        if !(self.zero.is_finite() && self.zero > 0.0) {
            return Err(MorphError::invalid_parameter(
                "tolerance.zero",
                format!("must be finite and positive, got {}", self.zero),
            ));
        }
        Ok(())
    }
}

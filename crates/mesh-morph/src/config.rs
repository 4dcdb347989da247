//! Tunable limits and thresholds for every engine.
//!
//! [`MorphConfig`] groups the tolerance context with per-engine settings. All
//! engines take it by reference; none of them mutate it.
//!
//! With the `config` feature enabled, configurations can be loaded from and
//! saved to TOML or JSON:
//!
//! ```toml
//! [tolerance]
//! absolute = 0.001
//!
//! [quality]
//! max_aspect_ratio = 50.0
//!
//! [smoothing]
//! max_iterations = 200
//! ```
//!
//! Missing sections and fields fall back to their defaults.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{MorphError, MorphResult};
use crate::tolerance::Tolerance;

/// Quality gates applied to subdivision output and reported for smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct QualityThresholds {
    /// Largest allowed `max_edge / min_edge` per triangle.
    pub max_aspect_ratio: f64,
    /// Smallest allowed interior angle, in radians.
    pub min_angle: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_aspect_ratio: 100.0,
            min_angle: 0.5_f64.to_radians(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SubdivisionConfig {
    /// Upper bound on `levels` for a single subdivision call.
    pub max_levels: u32,
}

impl Default for SubdivisionConfig {
    fn default() -> Self {
        Self { max_levels: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SmoothingConfig {
    /// Upper bound on `iterations` for a single smoothing call.
    pub max_iterations: usize,
    /// Converged when RMS displacement < `tolerance.absolute * convergence_multiplier`.
    pub convergence_multiplier: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            convergence_multiplier: 100.0,
        }
    }
}

/// Isotropic remeshing settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RemeshConfig {
    /// Split above `target * split_factor`, collapse below `target / split_factor`.
    pub split_factor: f64,
    /// Upper bound on `max_iterations` for a single remesh call.
    pub max_iterations: usize,
    /// Smallest valid target is `tolerance.absolute * tolerance_factor`.
    pub tolerance_factor: f64,
    /// Largest valid target is `bounding_box_diagonal * diagonal_factor`.
    pub diagonal_factor: f64,
    /// Allowed relative deviation of the mean edge length from the target.
    pub convergence_threshold: f64,
    /// Largest allowed `std_dev / mean` of edge lengths at convergence.
    pub uniformity_weight: f64,
}

impl Default for RemeshConfig {
    fn default() -> Self {
        Self {
            split_factor: 1.33,
            max_iterations: 100,
            tolerance_factor: 10.0,
            diagonal_factor: 0.5,
            convergence_threshold: 0.2,
            uniformity_weight: 0.35,
        }
    }
}

/// Complete configuration for morphology operations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct MorphConfig {
    pub tolerance: Tolerance,
    pub quality: QualityThresholds,
    pub subdivision: SubdivisionConfig,
    pub smoothing: SmoothingConfig,
    pub remesh: RemeshConfig,
}

impl MorphConfig {
    /// Configuration with default limits and the given absolute tolerance.
    pub fn with_tolerance(absolute: f64) -> Self {
        Self {
            tolerance: Tolerance::new(absolute),
            ..Self::default()
        }
    }

    /// Tight quality gates for downstream FEA or CAM consumers.
    pub fn strict() -> Self {
        Self {
            quality: QualityThresholds {
                max_aspect_ratio: 10.0,
                min_angle: 10.0_f64.to_radians(),
            },
            smoothing: SmoothingConfig {
                convergence_multiplier: 10.0,
                ..SmoothingConfig::default()
            },
            remesh: RemeshConfig {
                convergence_threshold: 0.1,
                uniformity_weight: 0.25,
                ..RemeshConfig::default()
            },
            ..Self::default()
        }
    }

    /// Loose gates for visualization meshes.
    pub fn relaxed() -> Self {
        Self {
            quality: QualityThresholds {
                max_aspect_ratio: 1000.0,
                min_angle: 0.1_f64.to_radians(),
            },
            remesh: RemeshConfig {
                convergence_threshold: 0.3,
                uniformity_weight: 0.5,
                ..RemeshConfig::default()
            },
            ..Self::default()
        }
    }

    /// Replace the tolerance context.
    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Replace the quality thresholds.
    pub fn quality(mut self, quality: QualityThresholds) -> Self {
        self.quality = quality;
        self
    }

    pub fn max_subdivision_levels(mut self, levels: u32) -> Self {
        self.subdivision.max_levels = levels;
        self
    }

    pub fn max_smoothing_iterations(mut self, iterations: usize) -> Self {
        self.smoothing.max_iterations = iterations;
        self
    }

    pub fn max_remesh_iterations(mut self, iterations: usize) -> Self {
        self.remesh.max_iterations = iterations;
        self
    }

    /// Reject non-finite, non-positive or inconsistent settings.
    pub fn validate(&self) -> MorphResult<()> {
        self.tolerance.validate()?;

        positive("quality.max_aspect_ratio", self.quality.max_aspect_ratio)?;
        if !(self.quality.min_angle.is_finite() && self.quality.min_angle >= 0.0) {
            return Err(MorphError::invalid_parameter(
                "quality.min_angle",
                format!("must be finite and non-negative, got {}", self.quality.min_angle),
            ));
        }
        if self.subdivision.max_levels == 0 {
            return Err(MorphError::invalid_parameter(
                "subdivision.max_levels",
                "must be at least 1",
            ));
        }
        if self.smoothing.max_iterations == 0 {
            return Err(MorphError::invalid_parameter(
                "smoothing.max_iterations",
                "must be at least 1",
            ));
        }
        positive(
            "smoothing.convergence_multiplier",
            self.smoothing.convergence_multiplier,
        )?;

        let r = &self.remesh;
        if !(r.split_factor.is_finite() && r.split_factor > 1.0) {
            return Err(MorphError::invalid_parameter(
                "remesh.split_factor",
                format!("must be finite and greater than 1, got {}", r.split_factor),
            ));
        }
        if r.max_iterations == 0 {
            return Err(MorphError::invalid_parameter(
                "remesh.max_iterations",
                "must be at least 1",
            ));
        }
        positive("remesh.tolerance_factor", r.tolerance_factor)?;
        positive("remesh.diagonal_factor", r.diagonal_factor)?;
        positive("remesh.convergence_threshold", r.convergence_threshold)?;
        positive("remesh.uniformity_weight", r.uniformity_weight)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> MorphResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MorphError::invalid_parameter(
            name,
            format!("must be finite and positive, got {}", value),
        ))
    }
}

#[cfg(feature = "config")]
impl MorphConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid, doesn't match the schema, or
    /// fails [`MorphConfig::validate`].
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Errors that can occur when loading or saving configurations.
#[cfg(feature = "config")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] MorphError),
}

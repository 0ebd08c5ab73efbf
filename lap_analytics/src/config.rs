use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read scoring config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scoring config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid scoring config: {0}")]
    Invalid(String),
}

/// Blend between discrete events and general noisiness in a category score.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CategoryWeights {
    pub event_intensity: f64,
    pub smoothness: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        // events dominate: a lap with spikes is worse than a lap that is merely noisy
        Self {
            event_intensity: 0.6,
            smoothness: 0.4,
        }
    }
}

/// Tunable constants for anomaly scoring. Loaded from JSON so the weighting
/// can change without rebuilding callers.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Events per lap that saturate a category's event intensity.
    pub event_reference_count: u32,
    pub category_weights: CategoryWeights,
    /// Share of the corner speed loss penalty in the speed category.
    pub corner_speed_loss_weight: f64,
    /// Severity at or above which an event counts as high severity.
    pub high_severity_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            event_reference_count: 3,
            category_weights: CategoryWeights::default(),
            corner_speed_loss_weight: 0.3,
            high_severity_threshold: 0.5,
        }
    }
}

impl ScoringConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let cfg: ScoringConfig = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_reference_count == 0 {
            return Err(ConfigError::Invalid(
                "event_reference_count must be at least 1".into(),
            ));
        }
        let weights = [
            ("category_weights.event_intensity", self.category_weights.event_intensity),
            ("category_weights.smoothness", self.category_weights.smoothness),
            ("corner_speed_loss_weight", self.corner_speed_loss_weight),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, w
                )));
            }
        }
        if self.category_weights.event_intensity + self.category_weights.smoothness == 0.0 {
            return Err(ConfigError::Invalid(
                "category weights cannot both be zero".into(),
            ));
        }
        if !(self.high_severity_threshold > 0.0 && self.high_severity_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "high_severity_threshold must lie in (0, 1], got {}",
                self.high_severity_threshold
            )));
        }
        Ok(())
    }
}

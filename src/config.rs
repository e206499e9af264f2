//! Configuration for the Kohonen engine.

use crate::error::{KohonenError, Result};
use crate::random::RandomKind;
use crate::som::Topology;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the Kohonen engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Map and training schedule configuration.
    #[serde(default)]
    pub som: SomConfig,

    /// Raw record loading configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Config {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.som.validate()?;
        Ok(config)
    }
}

/// What to do when `max(width, height) / 2 <= 1`, where the neighborhood
/// time constant `iterations / ln(radius)` is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatticeGuard {
    /// Refuse to initialize or train the map.
    #[default]
    Reject,
    /// Raise the lattice radius to [`CLAMPED_LATTICE_RADIUS`].
    Clamp,
    /// Log a warning and run the unguarded arithmetic.
    Warn,
}

/// Lattice radius used by [`LatticeGuard::Clamp`].
pub const CLAMPED_LATTICE_RADIUS: f64 = 2.0;

/// Self-Organizing Map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SomConfig {
    /// Number of columns (x axis).
    /// Default: 24.
    pub width: usize,

    /// Number of rows (y axis).
    /// Default: 18.
    pub height: usize,

    /// Seed for the initial weights.
    /// Default: None (derived from the clock; the resolved seed is stored on the grid).
    pub seed: Option<i64>,

    /// Grid-space distance convention.
    /// Default: square.
    pub topology: Topology,

    /// Learning rate of the first iteration.
    /// Default: 0.05.
    pub learning_rate_start: f64,

    /// Number of full passes over the training set.
    /// Default: 100.
    pub iterations: usize,

    /// Policy for lattices whose radius is 1 or less.
    /// Default: reject.
    pub lattice_guard: LatticeGuard,

    /// Random stream used for initialization.
    /// Default: sine.
    pub random: RandomKind,

    /// Run the BMU scan of each training vector on the rayon pool.
    /// Default: false.
    pub parallel_bmu: bool,

    /// Emit an `info` log line every this many iterations (0 disables).
    /// Default: 10.
    pub log_every: usize,
}

impl Default for SomConfig {
    fn default() -> Self {
        Self {
            width: 24,
            height: 18,
            seed: None,
            topology: Topology::Square,
            learning_rate_start: 0.05,
            iterations: 100,
            lattice_guard: LatticeGuard::Reject,
            random: RandomKind::Sine,
            parallel_bmu: false,
            log_every: 10,
        }
    }
}

impl SomConfig {
    /// Returns the total number of nodes in the grid.
    #[inline]
    pub fn total_nodes(&self) -> usize {
        self.width * self.height
    }

    /// Returns the configured seed, or one derived from the clock.
    pub fn resolve_seed(&self) -> i64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as i64)
                .unwrap_or_default()
        })
    }

    /// Checks the configuration before any map is built.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(KohonenError::InvalidTrainingInput(format!(
                "grid must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        if self.iterations == 0 {
            return Err(KohonenError::Config(
                "iterations must be greater than 0".to_string(),
            ));
        }
        if !(self.learning_rate_start.is_finite() && self.learning_rate_start > 0.0) {
            return Err(KohonenError::Config(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate_start
            )));
        }
        Ok(())
    }
}

/// Raw record loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Columns kept out of training (identifiers), matched case-insensitively.
    /// Default: `code`, `id`, `код`.
    pub info_columns: Vec<String>,

    /// Reduce feature keys to `[a-zA-Z0-9]`.
    /// Default: true.
    pub sanitize_keys: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            info_columns: vec!["code".to_string(), "id".to_string(), "код".to_string()],
            sanitize_keys: true,
        }
    }
}

impl LoaderConfig {
    /// Returns true if `column` is an information-only column.
    pub fn is_info_column(&self, column: &str) -> bool {
        let lower = column.to_lowercase();
        self.info_columns.iter().any(|c| c.to_lowercase() == lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.som.width, 24);
        assert_eq!(config.som.height, 18);
        assert_eq!(config.som.total_nodes(), 432);
        assert_eq!(config.som.iterations, 100);
        assert!((config.som.learning_rate_start - 0.05).abs() < 1e-12);
        assert_eq!(config.som.lattice_guard, LatticeGuard::Reject);
        assert!(config.som.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = SomConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(KohonenError::InvalidTrainingInput(_))
        ));

        let no_iterations = SomConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(no_iterations.validate(), Err(KohonenError::Config(_))));

        let bad_rate = SomConfig {
            learning_rate_start: f64::NAN,
            ..Default::default()
        };
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "som": { "width": 8, "topology": "hexagonal", "seed": 7 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.som.width, 8);
        assert_eq!(config.som.height, 18);
        assert_eq!(config.som.topology, Topology::Hexagonal);
        assert_eq!(config.som.seed, Some(7));
        assert!(config.loader.sanitize_keys);
    }

    #[test]
    fn test_info_columns_case_insensitive() {
        let loader = LoaderConfig::default();
        assert!(loader.is_info_column("ID"));
        assert!(loader.is_info_column("Code"));
        assert!(loader.is_info_column("КОД"));
        assert!(!loader.is_info_column("price"));
    }
}

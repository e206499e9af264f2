//! # Kohonen - Self-Organizing Map Engine
//!
//! Kohonen trains a Self-Organizing Map (SOM) on tabular records: a 2D
//! lattice of prototype vectors that, after training, places similar
//! records on nearby cells.
//!
//! ## Overview
//!
//! Records are flattened into numeric [`FeatureVector`]s (text columns go
//! through a [`CategoricalEncoder`]), collected into a [`TrainingSet`], and
//! fed to a [`TrainingEngine`]. The engine seeds a [`SomGrid`] uniformly
//! between each feature's observed minimum and maximum, then runs a fixed
//! number of online Kohonen passes with exponentially shrinking
//! neighborhood radius and learning rate.
//!
//! ## Key Features
//!
//! - **Reproducible initialization** from an explicit seed and [`RandomStream`]
//! - **Square and hexagonal** grid topologies
//! - **Progress reporting and cooperative cancellation** between iterations
//! - **Post-training analysis**: feature variance, low-influence features,
//!   per-cell statistics with categorical labels
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kohonen::{read_records, Config, DatasetLoader, TrainingEngine};
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let records = read_records(std::fs::File::open("records.json")?)?;
//! let dataset = DatasetLoader::new(config.loader.clone()).load(&records)?;
//!
//! let engine = TrainingEngine::new(config.som.clone())?;
//! let set = Arc::new(dataset.training_set.clone());
//! let mut grid = engine.initialize(set.clone(), &dataset.keys())?;
//! grid.set_categories(dataset.encoder.clone());
//! engine.train(&mut grid, &set)?;
//!
//! for v in kohonen::feature_variance(&grid) {
//!     println!("{}: {:.4}", v.key, v.variance);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Engine and loader configuration
//! - [`data`] - Feature vectors, training sets, categorical encoding, record loading
//! - [`random`] - Seeded random streams for initialization
//! - [`som`] - Grid, training engine and analysis

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod error;
pub mod random;
pub mod som;

// Re-export commonly used types
pub use config::{Config, LatticeGuard, LoaderConfig, SomConfig};
pub use data::{
    read_records, CategoricalEncoder, Codebook, Dataset, DatasetLoader, FeatureKeys,
    FeatureVector, RawRecord, RawValue, TextMapping, TrainingSet, MISSING_CODE,
};
pub use error::{KohonenError, Result};
pub use random::{ChaChaStream, RandomKind, RandomStream, SineStream};
pub use som::{
    feature_variance, low_influence_features, summarize_cells, CancellationToken,
    ChannelObserver, FeatureSummary, FeatureVariance, GridNode, IterationProgress, NoProgress,
    SomGrid, Topology, TrainingEngine, TrainingObserver, TrainingReport,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default initial learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;

/// Default number of training iterations.
pub const DEFAULT_ITERATIONS: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_constants() {
        let som = SomConfig::default();
        assert!((DEFAULT_LEARNING_RATE - som.learning_rate_start).abs() < 1e-12);
        assert_eq!(DEFAULT_ITERATIONS, som.iterations);
    }
}

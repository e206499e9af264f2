//! Self-Organizing Map (SOM) grid, training and analysis.
//!
//! - **Grid**: a flat arena of [`GridNode`]s with BMU search (map.rs)
//! - **Training**: online Kohonen updates with progress and cancellation (training.rs)
//! - **Analysis**: feature variance and cell statistics of a trained grid (analysis.rs)

pub mod analysis;
mod map;
mod node;
mod topology;
pub mod training;

pub use analysis::{
    feature_variance, low_influence_features, summarize_cells, FeatureSummary, FeatureVariance,
    LOW_INFLUENCE_PERCENTILE,
};
pub use map::SomGrid;
pub use node::GridNode;
pub use topology::Topology;
pub use training::{
    CancellationToken, ChannelObserver, IterationProgress, NoProgress, Schedule, TrainingEngine,
    TrainingObserver, TrainingReport,
};

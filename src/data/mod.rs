//! Training data: feature vectors, categorical codebooks and record loading.

pub mod encoder;
pub mod feature;
pub mod loader;

pub use encoder::{CategoricalEncoder, Codebook, TextMapping, MISSING_CODE};
pub use feature::{FeatureKeys, FeatureVector, TrainingSet};
pub use loader::{read_records, sanitize_key, Column, Dataset, DatasetLoader, RawRecord, RawValue};

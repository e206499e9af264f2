//! Error types for the Kohonen self-organizing map engine.

use thiserror::Error;

/// The main error type for Kohonen operations.
#[derive(Error, Debug)]
pub enum KohonenError {
    /// The training input cannot be used to build or train a map
    /// (empty training set, empty feature list, zero width or height).
    #[error("Invalid training input: {0}")]
    InvalidTrainingInput(String),

    /// A vector does not have the shape the grid expects.
    #[error("Shape mismatch: expected {expected} features, found {found}")]
    ShapeMismatch {
        /// The grid depth.
        expected: usize,
        /// The length of the offending vector.
        found: usize,
    },

    /// A vector has the right length but names its features differently or
    /// in a different order than the grid.
    #[error("Feature mismatch at position {position}: expected '{expected}', found '{found}'")]
    KeyMismatch {
        /// First position where the key lists differ.
        position: usize,
        /// The grid's key at that position.
        expected: String,
        /// The vector's key at that position.
        found: String,
    },

    /// The lattice radius is too small for the neighborhood decay schedule.
    #[error("Degenerate lattice: radius {radius} must be greater than 1")]
    DegenerateLattice {
        /// The computed lattice radius.
        radius: f64,
    },

    /// A cell coordinate outside the grid.
    #[error("Cell ({x}, {y}) is outside the {width}x{height} grid")]
    CellOutOfRange {
        /// Requested column.
        x: usize,
        /// Requested row.
        y: usize,
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
    },

    /// A strict lookup asked for a feature the vector does not carry.
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Kohonen operations.
pub type Result<T> = std::result::Result<T, KohonenError>;

impl KohonenError {
    /// Shorthand for a [`KohonenError::ShapeMismatch`].
    pub fn shape(expected: usize, found: usize) -> Self {
        KohonenError::ShapeMismatch { expected, found }
    }
}

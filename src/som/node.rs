//! Grid node representation for the Self-Organizing Map.

use crate::data::FeatureVector;
use crate::error::{KohonenError, Result};
use crate::som::Topology;
use serde::{Deserialize, Serialize};

/// A node of the map: a fixed lattice position and a prototype vector.
///
/// The position never changes after construction; the prototype is only
/// moved by the neighborhood update during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    x: usize,
    y: usize,
    weights: FeatureVector,
}

impl GridNode {
    /// Creates a node at `(x, y)` with the given prototype.
    pub fn new(x: usize, y: usize, weights: FeatureVector) -> Self {
        Self { x, y, weights }
    }

    /// Column of the node.
    #[inline]
    pub fn x(&self) -> usize {
        self.x
    }

    /// Row of the node.
    #[inline]
    pub fn y(&self) -> usize {
        self.y
    }

    /// `(x, y)` position.
    #[inline]
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    /// The current prototype.
    #[inline]
    pub fn weights(&self) -> &FeatureVector {
        &self.weights
    }

    /// Squared grid-space distance to `other` under `topology`.
    #[inline]
    pub fn distance_to_squared(&self, other: &GridNode, topology: Topology) -> f64 {
        topology.distance_squared(self.position(), other.position())
    }

    /// Moves every weight toward `input`:
    /// `w[i] += learning_rate * falloff * (input[i] - w[i])`.
    pub fn adjust_weights(&mut self, input: &[f64], learning_rate: f64, falloff: f64) -> Result<()> {
        if input.len() != self.weights.len() {
            return Err(KohonenError::shape(self.weights.len(), input.len()));
        }
        self.adjust_weights_unchecked(input, learning_rate, falloff);
        Ok(())
    }

    /// [`GridNode::adjust_weights`] for inputs already validated against the grid.
    #[inline]
    pub(crate) fn adjust_weights_unchecked(&mut self, input: &[f64], learning_rate: f64, falloff: f64) {
        debug_assert_eq!(self.weights.len(), input.len());
        let influence = learning_rate * falloff;

        for (w, i) in self.weights.values_mut().iter_mut().zip(input.iter()) {
            *w += influence * (i - *w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureKeys;

    fn node(x: usize, y: usize, values: Vec<f64>) -> GridNode {
        let keys = FeatureKeys::new((0..values.len()).map(|i| format!("f{}", i))).unwrap();
        GridNode::new(x, y, FeatureVector::new(keys, values).unwrap())
    }

    #[test]
    fn test_position() {
        let n = node(5, 10, vec![0.0; 3]);
        assert_eq!(n.position(), (5, 10));
        assert_eq!(n.weights().len(), 3);
    }

    #[test]
    fn test_distance_to_squared() {
        let a = node(0, 0, vec![0.0]);
        let b = node(3, 4, vec![0.0]);
        assert_eq!(a.distance_to_squared(&b, Topology::Square), 25.0);
        assert_eq!(b.distance_to_squared(&a, Topology::Square), 25.0);
        assert_eq!(a.distance_to_squared(&a, Topology::Hexagonal), 0.0);
    }

    #[test]
    fn test_adjust_weights() {
        let mut n = node(0, 0, vec![0.0, 2.0, 4.0]);
        n.adjust_weights(&[1.0, 1.0, 1.0], 0.5, 1.0).unwrap();
        assert_eq!(n.weights().values(), &[0.5, 1.5, 2.5]);

        n.adjust_weights(&[1.0, 1.0, 1.0], 0.5, 0.5).unwrap();
        assert!((n.weights()[0] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_adjust_weights_toward_equal_input_is_noop() {
        let mut n = node(0, 0, vec![0.3, -1.7]);
        n.adjust_weights(&[0.3, -1.7], 0.9, 1.0).unwrap();
        assert_eq!(n.weights().values(), &[0.3, -1.7]);
    }

    #[test]
    fn test_adjust_weights_shape_mismatch() {
        let mut n = node(0, 0, vec![0.0, 0.0]);
        let result = n.adjust_weights(&[1.0], 0.5, 1.0);
        assert!(matches!(
            result,
            Err(KohonenError::ShapeMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert_eq!(n.weights().values(), &[0.0, 0.0]);
    }
}

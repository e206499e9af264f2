//! Self-Organizing Map grid.

use crate::data::{CategoricalEncoder, FeatureKeys, FeatureVector, TrainingSet};
use crate::error::{KohonenError, Result};
use crate::som::{GridNode, Topology};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// A width x height lattice of prototype nodes.
///
/// Nodes live in one flat arena, column by column (`index = x * height + y`),
/// so walking the arena in order is the x-outer, y-inner scan that decides
/// BMU ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SomGridData")]
pub struct SomGrid {
    width: usize,
    height: usize,
    seed: i64,
    topology: Topology,
    keys: FeatureKeys,
    nodes: Vec<GridNode>,
    /// Codebooks for reading categorical prototypes back as text.
    #[serde(default)]
    categories: CategoricalEncoder,
    /// The set the grid was initialized from.
    #[serde(skip)]
    training_set: Option<Arc<TrainingSet>>,
}

impl SomGrid {
    /// Rebuilds a grid from plain prototype data.
    ///
    /// `prototypes` are in arena order (x outer, y inner) and must all share
    /// one non-empty key list.
    pub fn from_prototypes(
        width: usize,
        height: usize,
        seed: i64,
        topology: Topology,
        prototypes: Vec<FeatureVector>,
    ) -> Result<Self> {
        check_layout(width, height, prototypes.len())?;

        let keys = prototypes[0].keys().clone();
        if keys.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "prototypes have no features".to_string(),
            ));
        }

        let mut nodes = Vec::with_capacity(prototypes.len());
        for (i, weights) in prototypes.into_iter().enumerate() {
            check_keys(&keys, weights.keys())?;
            nodes.push(GridNode::new(i / height, i % height, weights));
        }

        Ok(Self::assemble(width, height, seed, topology, keys, nodes, None))
    }

    /// Builds a grid from nodes already laid out in arena order.
    pub(crate) fn assemble(
        width: usize,
        height: usize,
        seed: i64,
        topology: Topology,
        keys: FeatureKeys,
        nodes: Vec<GridNode>,
        training_set: Option<Arc<TrainingSet>>,
    ) -> Self {
        debug_assert_eq!(nodes.len(), width * height);
        Self {
            width,
            height,
            seed,
            topology,
            keys,
            nodes,
            categories: CategoricalEncoder::default(),
            training_set,
        }
    }

    /// Number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of features per prototype.
    #[inline]
    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// Seed the initial weights were drawn with.
    #[inline]
    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Grid-space distance convention.
    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Feature keys shared by every prototype.
    #[inline]
    pub fn keys(&self) -> &FeatureKeys {
        &self.keys
    }

    /// Total number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the grid has no width, height or depth.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth() == 0
    }

    /// All nodes in arena order.
    #[inline]
    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn nodes_mut(&mut self) -> &mut [GridNode] {
        &mut self.nodes
    }

    /// Arena index of `(x, y)`.
    #[inline]
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        x * self.height + y
    }

    /// `(x, y)` of an arena index.
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index / self.height, index % self.height)
    }

    /// Node at `(x, y)`, if inside the grid.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&GridNode> {
        if x < self.width && y < self.height {
            Some(&self.nodes[self.index_of(x, y)])
        } else {
            None
        }
    }

    /// Mutable node at `(x, y)`, if inside the grid.
    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut GridNode> {
        if x < self.width && y < self.height {
            let index = self.index_of(x, y);
            Some(&mut self.nodes[index])
        } else {
            None
        }
    }

    /// Codebooks used to label categorical features.
    #[inline]
    pub fn categories(&self) -> &CategoricalEncoder {
        &self.categories
    }

    /// Attaches the codebooks of the data the grid was trained on.
    pub fn set_categories(&mut self, categories: CategoricalEncoder) {
        self.categories = categories;
    }

    /// The training set the grid was initialized from, if still attached.
    pub fn training_set(&self) -> Option<&TrainingSet> {
        self.training_set.as_deref()
    }

    /// Finds the Best Matching Unit for `input`.
    ///
    /// The BMU is the first node, in arena order, with the smallest squared
    /// feature-space distance. Returns its `(x, y)`.
    pub fn find_bmu(&self, input: &[f64]) -> Result<(usize, usize)> {
        if input.len() != self.depth() {
            return Err(KohonenError::shape(self.depth(), input.len()));
        }
        Ok(self.coords(self.bmu_index(input)))
    }

    /// BMU of every vector in `set`, in set order.
    pub fn map_vectors(&self, set: &TrainingSet) -> Result<Vec<(usize, usize)>> {
        check_keys(&self.keys, set.keys())?;
        Ok(set
            .iter()
            .map(|v| self.coords(self.bmu_index(v.values())))
            .collect())
    }

    /// Sequential BMU scan. Strict `<` keeps the first node on ties.
    #[inline]
    pub(crate) fn bmu_index(&self, input: &[f64]) -> usize {
        let mut best_idx = 0;
        let mut best_dist = f64::MAX;

        for (i, node) in self.nodes.iter().enumerate() {
            let dist = node.weights().distance_squared(input);
            if dist < best_dist {
                best_dist = dist;
                best_idx = i;
            }
        }
        best_idx
    }

    /// Parallel BMU scan with the same tie-breaking as [`SomGrid::bmu_index`].
    pub(crate) fn bmu_index_parallel(&self, input: &[f64]) -> usize {
        let (_, best_idx) = self
            .nodes
            .par_iter()
            .enumerate()
            .map(|(i, node)| (node.weights().distance_squared(input), i))
            .filter(|(dist, _)| *dist < f64::MAX)
            .reduce(
                || (f64::MAX, usize::MAX),
                |a, b| {
                    if b.0 < a.0 || (b.0 == a.0 && b.1 < a.1) {
                        b
                    } else {
                        a
                    }
                },
            );

        // Nothing beat the starting distance: the sequential scan keeps node 0.
        if best_idx == usize::MAX {
            0
        } else {
            best_idx
        }
    }
}

/// Serialized shape of a [`SomGrid`], checked before a grid is built from it.
#[derive(Deserialize)]
struct SomGridData {
    width: usize,
    height: usize,
    seed: i64,
    topology: Topology,
    keys: FeatureKeys,
    nodes: Vec<GridNode>,
    #[serde(default)]
    categories: CategoricalEncoder,
}

impl TryFrom<SomGridData> for SomGrid {
    type Error = KohonenError;

    fn try_from(data: SomGridData) -> Result<Self> {
        check_layout(data.width, data.height, data.nodes.len())?;
        if data.keys.is_empty() {
            return Err(KohonenError::InvalidTrainingInput(
                "grid has no features".to_string(),
            ));
        }
        for (i, node) in data.nodes.iter().enumerate() {
            let expected = (i / data.height, i % data.height);
            if node.position() != expected {
                return Err(KohonenError::InvalidTrainingInput(format!(
                    "node {} is at {:?}, expected {:?}",
                    i,
                    node.position(),
                    expected
                )));
            }
            check_keys(&data.keys, node.weights().keys())?;
        }

        let mut grid = Self::assemble(
            data.width,
            data.height,
            data.seed,
            data.topology,
            data.keys,
            data.nodes,
            None,
        );
        grid.categories = data.categories;
        Ok(grid)
    }
}

impl Index<(usize, usize)> for SomGrid {
    type Output = GridNode;

    fn index(&self, (x, y): (usize, usize)) -> &GridNode {
        assert!(
            x < self.width && y < self.height,
            "cell ({}, {}) outside {}x{} grid",
            x,
            y,
            self.width,
            self.height
        );
        &self.nodes[self.index_of(x, y)]
    }
}

fn check_layout(width: usize, height: usize, nodes: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(KohonenError::InvalidTrainingInput(format!(
            "grid must be at least 1x1, got {}x{}",
            width, height
        )));
    }
    if nodes != width * height {
        return Err(KohonenError::InvalidTrainingInput(format!(
            "{}x{} grid needs {} prototypes, got {}",
            width,
            height,
            width * height,
            nodes
        )));
    }
    Ok(())
}

/// Fails unless `found` names the same features as `expected`, in order.
pub(crate) fn check_keys(expected: &FeatureKeys, found: &FeatureKeys) -> Result<()> {
    if expected.matches(found) {
        return Ok(());
    }
    if expected.len() != found.len() {
        return Err(KohonenError::shape(expected.len(), found.len()));
    }
    let position = expected
        .iter()
        .zip(found.iter())
        .position(|(a, b)| a != b)
        .unwrap_or(0);
    Err(KohonenError::KeyMismatch {
        position,
        expected: expected[position].to_string(),
        found: found[position].to_string(),
    })
}

//! Feature vectors and training sets.
//!
//! Every vector keeps a handle to a shared, ordered key list. Parallel
//! vectors (a training record and a node prototype) are compared by index,
//! so they must share the same key order; lookups by name are fail-soft and
//! return 0 for keys the vector does not carry.

use crate::error::{KohonenError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// An ordered, shared list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureKeys(Arc<[String]>);

impl FeatureKeys {
    /// Creates a key list. Duplicate names are rejected.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(KohonenError::InvalidTrainingInput(format!(
                    "duplicate feature key '{}'",
                    key
                )));
            }
        }
        Ok(Self(keys.into()))
    }

    /// Number of features.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no features.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of `key`, if present.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.0.iter().position(|k| k == key)
    }

    /// Iterates over the names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The names as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// True when both lists name the same features in the same order.
    #[inline]
    pub fn matches(&self, other: &FeatureKeys) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl TryFrom<Vec<String>> for FeatureKeys {
    type Error = KohonenError;

    fn try_from(keys: Vec<String>) -> Result<Self> {
        Self::new(keys)
    }
}

impl From<FeatureKeys> for Vec<String> {
    fn from(keys: FeatureKeys) -> Self {
        keys.0.to_vec()
    }
}

impl Index<usize> for FeatureKeys {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.0[index]
    }
}

/// A numeric feature vector with a per-feature maximum used for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeatureVectorData")]
pub struct FeatureVector {
    keys: FeatureKeys,
    values: Vec<f64>,
    max_observed: Vec<f64>,
}

impl FeatureVector {
    /// Creates a vector with a zero display maximum for every feature.
    pub fn new(keys: FeatureKeys, values: Vec<f64>) -> Result<Self> {
        let max_observed = vec![0.0; values.len()];
        Self::with_max_observed(keys, values, max_observed)
    }

    /// Creates a vector carrying an explicit display maximum per feature.
    pub fn with_max_observed(
        keys: FeatureKeys,
        values: Vec<f64>,
        max_observed: Vec<f64>,
    ) -> Result<Self> {
        if values.len() != keys.len() {
            return Err(KohonenError::shape(keys.len(), values.len()));
        }
        if max_observed.len() != keys.len() {
            return Err(KohonenError::shape(keys.len(), max_observed.len()));
        }
        Ok(Self {
            keys,
            values,
            max_observed,
        })
    }

    /// Number of features.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the vector has no features.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The feature names.
    #[inline]
    pub fn keys(&self) -> &FeatureKeys {
        &self.keys
    }

    /// The values in key order.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// The display maxima in key order.
    #[inline]
    pub fn max_observed(&self) -> &[f64] {
        &self.max_observed
    }

    /// Value of `key`, or 0 when the vector does not carry it.
    ///
    /// A missing key degrades silently; use [`FeatureVector::try_get`] where
    /// that would hide a bug.
    pub fn get(&self, key: &str) -> f64 {
        match self.keys.position(key) {
            Some(i) => self.values[i],
            None => {
                warn!("Feature '{}' not present, reading as 0", key);
                0.0
            }
        }
    }

    /// Value of `key`, failing when it is absent.
    pub fn try_get(&self, key: &str) -> Result<f64> {
        self.keys
            .position(key)
            .map(|i| self.values[i])
            .ok_or_else(|| KohonenError::UnknownFeature(key.to_string()))
    }

    /// Value divided by the display maximum, 0 when the maximum is 0.
    pub fn normalized(&self, index: usize) -> f64 {
        let max = self.max_observed[index];
        if max == 0.0 {
            0.0
        } else {
            self.values[index] / max
        }
    }

    /// Squared Euclidean distance to `other`, index by index.
    #[inline]
    pub fn distance_squared(&self, other: &[f64]) -> f64 {
        debug_assert_eq!(
            self.values.len(),
            other.len(),
            "Vector dimensions must match"
        );

        self.values
            .iter()
            .zip(other.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Iterates over `(key, value, max_observed)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.keys
            .iter()
            .zip(self.values.iter().copied())
            .zip(self.max_observed.iter().copied())
            .map(|((k, v), m)| (k, v, m))
    }
}

#[derive(Deserialize)]
struct FeatureVectorData {
    keys: FeatureKeys,
    values: Vec<f64>,
    max_observed: Vec<f64>,
}

impl TryFrom<FeatureVectorData> for FeatureVector {
    type Error = KohonenError;

    fn try_from(data: FeatureVectorData) -> Result<Self> {
        Self::with_max_observed(data.keys, data.values, data.max_observed)
    }
}

impl Index<usize> for FeatureVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

/// An ordered, read-only collection of vectors sharing one key list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrainingSetData")]
pub struct TrainingSet {
    keys: FeatureKeys,
    vectors: Vec<FeatureVector>,
}

impl TrainingSet {
    /// Builds a training set from raw rows in key order.
    pub fn new(keys: FeatureKeys, rows: Vec<Vec<f64>>) -> Result<Self> {
        let vectors = rows
            .into_iter()
            .map(|row| FeatureVector::new(keys.clone(), row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keys, vectors })
    }

    /// Builds a training set from existing vectors, which must share `keys`.
    pub fn from_vectors(keys: FeatureKeys, vectors: Vec<FeatureVector>) -> Result<Self> {
        for v in &vectors {
            if !v.keys().matches(&keys) {
                return Err(KohonenError::shape(keys.len(), v.len()));
            }
        }
        Ok(Self { keys, vectors })
    }

    /// The shared key list.
    #[inline]
    pub fn keys(&self) -> &FeatureKeys {
        &self.keys
    }

    /// Number of features per vector.
    #[inline]
    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// Number of vectors.
    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Returns true if the set holds no vectors.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The vectors in set order.
    #[inline]
    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    /// Iterates over the vectors in set order.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureVector> {
        self.vectors.iter()
    }

    /// Per-key `(min, max)` across the set, one pass per key.
    ///
    /// Keys the set does not carry read as 0. Returns an empty bound of
    /// `(0, 0)` for every key when the set is empty.
    pub fn bounds(&self, keys: &[String]) -> Vec<(f64, f64)> {
        keys.iter()
            .map(|key| match self.keys.position(key) {
                Some(i) => column_bounds(self.vectors.iter().map(|v| v.values[i])),
                None => {
                    warn!("Feature '{}' not in training set, bounds read as 0", key);
                    (0.0, 0.0)
                }
            })
            .collect()
    }

    /// Projects the set onto `keys`, in that order. Missing keys read as 0.
    pub fn select(&self, keys: &[String]) -> Result<TrainingSet> {
        let projected = FeatureKeys::new(keys.iter().cloned())?;
        let positions: Vec<Option<usize>> = keys.iter().map(|k| self.keys.position(k)).collect();
        for (key, pos) in keys.iter().zip(&positions) {
            if pos.is_none() {
                warn!("Feature '{}' not in training set, selected as 0", key);
            }
        }

        let rows = self
            .vectors
            .iter()
            .map(|v| {
                positions
                    .iter()
                    .map(|p| p.map(|i| v.values[i]).unwrap_or(0.0))
                    .collect()
            })
            .collect();
        TrainingSet::new(projected, rows)
    }
}

#[derive(Deserialize)]
struct TrainingSetData {
    keys: FeatureKeys,
    vectors: Vec<FeatureVector>,
}

impl TryFrom<TrainingSetData> for TrainingSet {
    type Error = KohonenError;

    fn try_from(data: TrainingSetData) -> Result<Self> {
        Self::from_vectors(data.keys, data.vectors)
    }
}

impl<'a> IntoIterator for &'a TrainingSet {
    type Item = &'a FeatureVector;
    type IntoIter = std::slice::Iter<'a, FeatureVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.vectors.iter()
    }
}

fn column_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

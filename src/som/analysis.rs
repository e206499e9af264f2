//! Post-training analysis of a grid's prototypes.

use crate::error::{KohonenError, Result};
use crate::som::SomGrid;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Share of features, lowest variance first, flagged as low influence.
pub const LOW_INFLUENCE_PERCENTILE: f64 = 0.2;

/// Spread of one feature across every node of a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVariance {
    /// Feature key.
    pub key: String,
    /// Population mean over all nodes.
    pub mean: f64,
    /// Population variance over all nodes.
    pub variance: f64,
}

/// Population mean and variance of every feature over all nodes, in key order.
///
/// A feature that holds the same value on every node has a variance of
/// exactly 0.
pub fn feature_variance(grid: &SomGrid) -> Vec<FeatureVariance> {
    let nodes = grid.nodes();
    if nodes.is_empty() {
        return Vec::new();
    }
    let n = nodes.len() as f64;

    grid.keys()
        .as_slice()
        .par_iter()
        .enumerate()
        .map(|(i, key)| {
            // Shift by the first value so constant columns cancel exactly.
            let first = nodes[0].weights().values()[i];
            let shifted: f64 = nodes.iter().map(|node| node.weights().values()[i] - first).sum();
            let mean = first + shifted / n;
            let variance = nodes
                .iter()
                .map(|node| {
                    let d = node.weights().values()[i] - mean;
                    d * d
                })
                .sum::<f64>()
                / n;

            FeatureVariance {
                key: key.clone(),
                mean,
                variance,
            }
        })
        .collect()
}

/// Keys of the features whose variance is at or below the
/// [`LOW_INFLUENCE_PERCENTILE`] order statistic, in input order.
///
/// The cutoff is the `ceil(n * 0.2) - 1`-th smallest variance, clamped to
/// the first.
pub fn low_influence_features(variances: &[FeatureVariance]) -> Vec<String> {
    if variances.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<f64> = variances.iter().map(|v| v.variance).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (sorted.len() as f64 * LOW_INFLUENCE_PERCENTILE).ceil() as usize;
    let threshold = sorted[rank.saturating_sub(1)];

    variances
        .iter()
        .filter(|v| v.variance <= threshold)
        .map(|v| v.key.clone())
        .collect()
}

/// One feature of a cell selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Feature key.
    pub key: String,
    /// Mean prototype value over the selected cells.
    pub mean: f64,
    /// Nearest categorical label for the mean, if the feature is categorical.
    pub label: Option<String>,
}

/// Per-feature statistics of the prototypes at `cells`.
pub fn summarize_cells(grid: &SomGrid, cells: &[(usize, usize)]) -> Result<Vec<FeatureSummary>> {
    if cells.is_empty() {
        return Err(KohonenError::InvalidTrainingInput(
            "no cells selected".to_string(),
        ));
    }

    let mut selected = Vec::with_capacity(cells.len());
    for &(x, y) in cells {
        let node = grid.get(x, y).ok_or(KohonenError::CellOutOfRange {
            x,
            y,
            width: grid.width(),
            height: grid.height(),
        })?;
        selected.push(node.weights().values());
    }

    let n = selected.len() as f64;
    let summaries = grid
        .keys()
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let mean = selected.iter().map(|values| values[i]).sum::<f64>() / n;
            FeatureSummary {
                key: key.to_string(),
                mean,
                label: grid
                    .categories()
                    .nearest_label(key, mean)
                    .map(str::to_string),
            }
        })
        .collect();

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CategoricalEncoder, Codebook, FeatureKeys, FeatureVector};
    use crate::som::Topology;

    fn grid(rows: &[[f64; 3]]) -> SomGrid {
        let keys = FeatureKeys::new(["a", "b", "color"]).unwrap();
        let prototypes = rows
            .iter()
            .map(|r| FeatureVector::new(keys.clone(), r.to_vec()).unwrap())
            .collect();
        SomGrid::from_prototypes(2, 2, 0, Topology::Square, prototypes).unwrap()
    }

    fn sample() -> SomGrid {
        grid(&[
            [1.5, 0.0, 0.0],
            [1.5, 2.0, 1.0],
            [1.5, 4.0, 2.0],
            [1.5, 6.0, 0.4],
        ])
    }

    #[test]
    fn test_constant_feature_has_zero_variance() {
        let variances = feature_variance(&sample());
        assert_eq!(variances[0].key, "a");
        assert_eq!(variances[0].mean, 1.5);
        assert_eq!(variances[0].variance, 0.0);
    }

    #[test]
    fn test_population_variance() {
        let variances = feature_variance(&sample());
        // 0, 2, 4, 6: mean 3, squared deviations 9 + 1 + 1 + 9.
        assert!((variances[1].mean - 3.0).abs() < 1e-12);
        assert!((variances[1].variance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_low_influence_cutoff() {
        let v = |key: &str, variance: f64| FeatureVariance {
            key: key.to_string(),
            mean: 0.0,
            variance,
        };

        // n = 5: ceil(1.0) - 1 = 0, only the smallest.
        let five = [v("a", 3.0), v("b", 0.5), v("c", 2.0), v("d", 9.0), v("e", 1.0)];
        assert_eq!(low_influence_features(&five), vec!["b"]);

        // n = 6: ceil(1.2) - 1 = 1, the two smallest.
        let six = [
            v("a", 3.0),
            v("b", 0.5),
            v("c", 2.0),
            v("d", 9.0),
            v("e", 1.0),
            v("f", 4.0),
        ];
        assert_eq!(low_influence_features(&six), vec!["b", "e"]);

        // n = 1 clamps to the only feature.
        assert_eq!(low_influence_features(&[v("x", 7.0)]), vec!["x"]);
        assert!(low_influence_features(&[]).is_empty());
    }

    #[test]
    fn test_low_influence_keeps_ties() {
        let v = |key: &str, variance: f64| FeatureVariance {
            key: key.to_string(),
            mean: 0.0,
            variance,
        };
        let tied = [v("a", 0.0), v("b", 1.0), v("c", 0.0)];
        assert_eq!(low_influence_features(&tied), vec!["a", "c"]);
    }

    #[test]
    fn test_summarize_cells() {
        let mut g = sample();
        let mut categories = CategoricalEncoder::new();
        categories.insert("color", Codebook::from_values(["red", "green", "blue"]));
        g.set_categories(categories);

        let summary = summarize_cells(&g, &[(0, 0), (0, 1)]).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[1].key, "b");
        assert!((summary[1].mean - 1.0).abs() < 1e-12);
        assert!(summary[1].label.is_none());
        assert!((summary[2].mean - 0.5).abs() < 1e-12);
        // 0.5 is equally far from codes 0 and 1.
        assert_eq!(summary[2].label.as_deref(), Some("red"));

        let summary = summarize_cells(&g, &[(1, 0)]).unwrap();
        assert_eq!(summary[2].label.as_deref(), Some("blue"));
    }

    #[test]
    fn test_summarize_cells_rejects_bad_selection() {
        let g = sample();
        assert!(matches!(
            summarize_cells(&g, &[(0, 0), (2, 0)]),
            Err(KohonenError::CellOutOfRange { x: 2, y: 0, .. })
        ));
        assert!(summarize_cells(&g, &[]).is_err());
    }
}

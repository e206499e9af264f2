//! Grid-space distance conventions.
//!
//! Topology only affects which nodes count as neighbors of a BMU; the
//! feature-space distance used to find the BMU is always squared Euclidean.

use serde::{Deserialize, Serialize};

/// Adjacency convention of the map lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Square cells, Euclidean offsets.
    #[default]
    Square,
    /// Offset-row hexagonal cells, cube-coordinate distance.
    Hexagonal,
}

impl Topology {
    /// Squared grid distance between cells `a` and `b`, both `(x, y)`.
    ///
    /// Square: `dx² + dy²`. Hexagonal: the offset coordinates are converted
    /// to cube coordinates (`x - y/2`, `-x' - y`, `y`) and the result is the
    /// squared largest axis difference.
    #[inline]
    pub fn distance_squared(self, a: (usize, usize), b: (usize, usize)) -> f64 {
        let (ax, ay) = (a.0 as i64, a.1 as i64);
        let (bx, by) = (b.0 as i64, b.1 as i64);

        match self {
            Topology::Square => {
                let dx = ax - bx;
                let dy = ay - by;
                (dx * dx + dy * dy) as f64
            }
            Topology::Hexagonal => {
                let (x1, y1, z1) = to_cube(ax, ay);
                let (x2, y2, z2) = to_cube(bx, by);
                let d = (x1 - x2).abs().max((y1 - y2).abs()).max((z1 - z2).abs());
                (d * d) as f64
            }
        }
    }
}

#[inline]
fn to_cube(x: i64, y: i64) -> (i64, i64, i64) {
    let cx = x - y / 2;
    let cz = y;
    (cx, -cx - cz, cz)
}

impl std::str::FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "square" => Ok(Topology::Square),
            "hexagonal" | "hex" => Ok(Topology::Hexagonal),
            other => Err(format!("unknown topology '{}' (expected square or hexagonal)", other)),
        }
    }
}

use geo_types::{Coord, LineString};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Indices of the points Douglas-Peucker keeps, in ascending order.
///
/// The first and last points are always kept. An interior point is kept only if
/// its distance to the current chord is strictly greater than `epsilon`; among
/// equally far points the later one is split on. A zero-length chord (closed
/// ring) measures plain distance to its endpoint. Inputs of fewer than three
/// points, and a negative `epsilon`, keep every point.
pub fn douglas_peucker_indices(points: &[[f64; 2]], epsilon: f64) -> Vec<usize> {
    use geo::SimplifyIdx;

    let n = points.len();
    if n < 3 || epsilon < 0.0 {
        return (0..n).collect();
    }
    // zero would keep every point; the smallest positive tolerance still drops
    // points lying exactly on the chord
    let epsilon = if epsilon == 0.0 { f64::MIN_POSITIVE } else { epsilon };
    to_line_string(points).simplify_idx(&epsilon)
}

/// Douglas-Peucker polyline reduction.
pub fn douglas_peucker(points: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    douglas_peucker_indices(points, epsilon)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

fn to_line_string(points: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

/// Trait for polyline simplification algorithms
pub trait PolylineSimplifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reduce the point count while keeping both endpoints
    fn simplify(&self, points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]>;
}

/// Douglas-Peucker using geo crate's implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct DouglasPeuckerSimplifier;

impl PolylineSimplifier for DouglasPeuckerSimplifier {
    fn name(&self) -> &'static str {
        "douglas_peucker"
    }

    fn simplify(&self, points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
        douglas_peucker(points, tolerance)
    }
}

/// Visvalingam-Whyatt using geo crate's implementation; `tolerance` is an area
#[derive(Debug, Clone, Copy, Default)]
pub struct VisvalingamWhyattSimplifier;

impl PolylineSimplifier for VisvalingamWhyattSimplifier {
    fn name(&self) -> &'static str {
        "visvalingam_whyatt"
    }

    fn simplify(&self, points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
        use geo::SimplifyVw;

        if points.len() < 3 {
            return points.to_vec();
        }
        to_line_string(points)
            .simplify_vw(&tolerance)
            .coords()
            .map(|c| [c.x, c.y])
            .collect()
    }
}

/// Built-in simplifiers, selectable from configuration.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SimplifyMethod {
    #[default]
    DouglasPeucker,
    VisvalingamWhyatt,
}

impl PolylineSimplifier for SimplifyMethod {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn simplify(&self, points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
        match self {
            Self::DouglasPeucker => DouglasPeuckerSimplifier.simplify(points, tolerance),
            Self::VisvalingamWhyatt => VisvalingamWhyattSimplifier.simplify(points, tolerance),
        }
    }
}

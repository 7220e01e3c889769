use std::cmp::Ordering;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Neighbour offsets in counter-clockwise order starting east (image y grows down).
pub const ANGULAR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Orthogonal offsets (E, N, W, S).
pub const ORTHOGONAL_OFFSETS: [(i32, i32); 4] = [(1, 0), (0, -1), (-1, 0), (0, 1)];

/// Walk preference: orthogonal steps first, then diagonals, each counter-clockwise.
pub const ORTHOGONAL_FIRST_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (0, -1),
    (-1, 0),
    (0, 1),
    (1, -1),
    (-1, -1),
    (-1, 1),
    (1, 1),
];

/// An integer pixel coordinate. Identity is coordinate equality.
///
/// Ordering is raster order: by row, then by column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    pub x: i32,
    pub y: i32,
}

impl Pixel {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// True when the two pixels touch under 8-adjacency (and are distinct).
    pub fn touches(self, other: Pixel) -> bool {
        self != other && self.chebyshev(other) <= 1
    }

    /// True when the two pixels share a side.
    pub fn touches_orthogonally(self, other: Pixel) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }

    pub fn chebyshev(self, other: Pixel) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn distance(self, other: Pixel) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn to_point(self) -> [f64; 2] {
        [f64::from(self.x), f64::from(self.y)]
    }

    /// Counter-clockwise angle of this pixel seen from `origin`, in `[0, 2π)`.
    pub fn angle_from(self, origin: [f64; 2]) -> f64 {
        let dx = f64::from(self.x) - origin[0];
        let dy = origin[1] - f64::from(self.y);
        dy.atan2(dx).rem_euclid(std::f64::consts::TAU)
    }
}

impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Pixel adjacency rule used for labeling and neighbour queries.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Connectivity {
    /// Side-sharing neighbours only
    Four,
    /// Side- and corner-sharing neighbours
    #[default]
    Eight,
}

impl Connectivity {
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Self::Four => &ORTHOGONAL_OFFSETS,
            Self::Eight => &ANGULAR_OFFSETS,
        }
    }

    pub fn connects(self, a: Pixel, b: Pixel) -> bool {
        match self {
            Self::Four => a.touches_orthogonally(b),
            Self::Eight => a.touches(b),
        }
    }
}

/// Inclusive integer bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl PixelBox {
    pub fn from_pixels<'a>(pixels: impl IntoIterator<Item = &'a Pixel>) -> Option<Self> {
        let mut iter = pixels.into_iter();
        let first = iter.next()?;
        let mut bbox = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in iter {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1) as u32
    }

    pub fn contains(&self, p: Pixel) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Mean of a set of pixel coordinates.
pub fn mean_point<'a>(pixels: impl IntoIterator<Item = &'a Pixel>) -> Option<[f64; 2]> {
    let mut sum = [0.0, 0.0];
    let mut count = 0usize;
    for p in pixels {
        sum[0] += f64::from(p.x);
        sum[1] += f64::from(p.y);
        count += 1;
    }
    (count > 0).then(|| [sum[0] / count as f64, sum[1] / count as f64])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_ordering() {
        let mut pixels = vec![Pixel::new(3, 1), Pixel::new(0, 2), Pixel::new(5, 0), Pixel::new(1, 1)];
        pixels.sort();
        assert_eq!(
            pixels,
            vec![Pixel::new(5, 0), Pixel::new(1, 1), Pixel::new(3, 1), Pixel::new(0, 2)]
        );
    }

    #[test]
    fn test_adjacency() {
        let p = Pixel::new(4, 4);
        assert!(p.touches(Pixel::new(5, 5)));
        assert!(!p.touches_orthogonally(Pixel::new(5, 5)));
        assert!(p.touches_orthogonally(Pixel::new(4, 3)));
        assert!(!p.touches(p));
        assert!(!Connectivity::Four.connects(p, Pixel::new(3, 3)));
        assert!(Connectivity::Eight.connects(p, Pixel::new(3, 3)));
    }

    #[test]
    fn test_angle_is_counter_clockwise_from_east() {
        let origin = [0.0, 0.0];
        let east = Pixel::new(1, 0).angle_from(origin);
        let north = Pixel::new(0, -1).angle_from(origin);
        let west = Pixel::new(-1, 0).angle_from(origin);
        assert!(east.abs() < 1e-9);
        assert!((north - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert!(west > north);
    }

    #[test]
    fn test_connectivity_strum_round_trip() {
        use std::str::FromStr;
        assert_eq!(Connectivity::Eight.to_string(), "eight");
        assert_eq!(Connectivity::from_str("four").unwrap(), Connectivity::Four);
    }

    #[test]
    fn test_bounding_box() {
        let pixels = [Pixel::new(2, 3), Pixel::new(-1, 5), Pixel::new(4, 4)];
        let bbox = PixelBox::from_pixels(&pixels).unwrap();
        assert_eq!(bbox.width(), 6);
        assert_eq!(bbox.height(), 3);
        assert!(bbox.contains(Pixel::new(0, 4)));
        assert!(PixelBox::from_pixels(&[]).is_none());
    }
}

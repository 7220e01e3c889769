//! Skeletonization strategies.
//!
//! Every strategy works on a [`ThinningGrid`], a padded local copy of an island,
//! and reads the 8-neighbourhood of a pixel as the ring P2..P9:
//!
//! ```text
//! P9 P2 P3
//! P8 P1 P4
//! P7 P6 P5
//! ```

pub mod hilditch;
pub mod zhang_suen;

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::debug;

use crate::error::Result;
use crate::island::Island;
use crate::types::{Connectivity, Pixel};

pub use hilditch::HilditchThinning;
pub use zhang_suen::ZhangSuenThinning;

/// Offsets of P2..P9, clockwise from north (image y grows down).
pub const NEIGHBOURHOOD: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Indices into a neighbourhood array.
pub(crate) const P2: usize = 0;
pub(crate) const P4: usize = 2;
pub(crate) const P6: usize = 4;
pub(crate) const P8: usize = 6;

/// Trait for skeletonization algorithms
pub trait Thinning: Send + Sync {
    /// Short identifier used in logs and pipeline summaries
    fn name(&self) -> &'static str;

    /// Copy the island into a working grid
    fn prepare(&self, island: &Island) -> ThinningGrid {
        ThinningGrid::from_island(island)
    }

    /// Thin the grid and return the surviving pixels in global coordinates
    fn thin(&self, grid: ThinningGrid) -> BTreeSet<Pixel>;
}

/// Padded binary working grid for one island.
///
/// The grid carries a one-pixel background border so that neighbourhood reads
/// never leave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinningGrid {
    width: i32,
    height: i32,
    origin: Pixel,
    cells: Vec<bool>,
}

impl ThinningGrid {
    pub fn from_island(island: &Island) -> Self {
        let Some(bbox) = island.bounding_box() else {
            return Self {
                width: 0,
                height: 0,
                origin: Pixel::new(0, 0),
                cells: Vec::new(),
            };
        };
        let origin = Pixel::new(bbox.min_x - 1, bbox.min_y - 1);
        let width = bbox.width() as i32 + 2;
        let height = bbox.height() as i32 + 2;
        let mut grid = Self {
            width,
            height,
            origin,
            cells: vec![false; (width * height) as usize],
        };
        for p in island.iter() {
            grid.set(p.x - origin.x, p.y - origin.y, true);
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Global coordinate of local cell (0, 0).
    pub fn origin(&self) -> Pixel {
        self.origin
    }

    /// Out-of-grid cells read as background.
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return false;
        }
        self.cells[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.cells[(y * self.width + x) as usize] = value;
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }

    /// Local coordinates of foreground cells in raster order.
    pub fn foreground(&self) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    /// P2..P9 around a local cell.
    pub fn neighbourhood(&self, x: i32, y: i32) -> [bool; 8] {
        let mut ring = [false; 8];
        for (slot, &(dx, dy)) in ring.iter_mut().zip(NEIGHBOURHOOD.iter()) {
            *slot = self.get(x + dx, y + dy);
        }
        ring
    }

    /// Foreground cells as global pixels.
    pub fn pixels(&self) -> BTreeSet<Pixel> {
        self.foreground()
            .into_iter()
            .map(|(x, y)| Pixel::new(x + self.origin.x, y + self.origin.y))
            .collect()
    }

    /// Whether the cell can be deleted right now without splitting its neighbours
    /// or eating a line end.
    pub(crate) fn is_deletable(&self, x: i32, y: i32) -> bool {
        let ring = self.neighbourhood(x, y);
        self.get(x, y) && neighbour_count(&ring) >= 2 && transitions(&ring) == 1
    }

    /// Remove L-corner cells left where a diagonal step would do.
    ///
    /// A cell qualifies when it has exactly two orthogonal neighbours at right
    /// angles, the diagonal between them is background, and its 8-connectivity
    /// number is 1. Returns the number of cells removed.
    pub fn remove_staircases(&mut self) -> usize {
        let mut removed = 0;
        for (x, y) in self.foreground() {
            let ring = self.neighbourhood(x, y);
            let orthogonal = [ring[P2], ring[P4], ring[P6], ring[P8]];
            if orthogonal.iter().filter(|&&v| v).count() != 2 {
                continue;
            }
            // index of the diagonal lying between two orthogonal neighbours
            let corner = match (ring[P2], ring[P4], ring[P6], ring[P8]) {
                (true, true, false, false) => 1,
                (false, true, true, false) => 3,
                (false, false, true, true) => 5,
                (true, false, false, true) => 7,
                _ => continue,
            };
            if ring[corner] || connectivity_number(&ring) != 1 {
                continue;
            }
            self.set(x, y, false);
            removed += 1;
        }
        removed
    }
}

/// B(P1): number of foreground neighbours.
pub fn neighbour_count(ring: &[bool; 8]) -> usize {
    ring.iter().filter(|&&v| v).count()
}

/// A(P1): number of background-to-foreground transitions around P2..P9..P2.
pub fn transitions(ring: &[bool; 8]) -> usize {
    (0..8).filter(|&i| !ring[i] && ring[(i + 1) % 8]).count()
}

/// Yokoi 8-connectivity number of the centre cell.
pub fn connectivity_number(ring: &[bool; 8]) -> usize {
    // x1..x8 counter-clockwise from east, over background
    let order = [P4, 1, P2, 7, P8, 5, P6, 3];
    let bg = |k: usize| -> i32 { i32::from(!ring[order[k % 8]]) };
    let sum: i32 = [0, 2, 4, 6]
        .iter()
        .map(|&k| bg(k) - bg(k) * bg(k + 1) * bg(k + 2))
        .sum();
    sum.max(0) as usize
}

/// Built-in strategies, selectable from configuration.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThinningKind {
    /// Two-subiteration parallel thinning
    #[default]
    ZhangSuen,
    /// Sequential thinning with the A(P2)/A(P4) line-preserving conditions
    Hilditch,
}

impl Thinning for ThinningKind {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn thin(&self, grid: ThinningGrid) -> BTreeSet<Pixel> {
        match self {
            Self::ZhangSuen => ZhangSuenThinning.thin(grid),
            Self::Hilditch => HilditchThinning.thin(grid),
        }
    }
}

/// Reduce an island to an 8-connected, roughly one-pixel-wide skeleton.
///
/// Islands of one or two pixels are already skeletons and are returned unchanged.
pub fn skeletonize(island: &Island, thinning: &dyn Thinning) -> Result<Island> {
    if island.len() <= 2 {
        return Ok(island.clone());
    }
    let grid = thinning.prepare(island);
    let pixels = thinning.thin(grid);
    debug!(
        strategy = thinning.name(),
        before = island.len(),
        after = pixels.len(),
        "skeletonized island"
    );
    Island::from_pixels(pixels, Connectivity::Eight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::BinaryRaster;
    use strum::IntoEnumIterator;

    pub(crate) fn island_from_rows(rows: &[&str]) -> Island {
        let raster = BinaryRaster::from_rows(rows);
        Island::from_pixels(raster.foreground_pixels(), Connectivity::Eight)
            .expect("rows form one island")
    }

    #[test]
    fn test_transitions_and_count() {
        // P2, P3, P4 set: one contiguous arc
        let ring = [true, true, true, false, false, false, false, false];
        assert_eq!(transitions(&ring), 1);
        assert_eq!(neighbour_count(&ring), 3);

        // N and S only: two arcs
        let ring = [true, false, false, false, true, false, false, false];
        assert_eq!(transitions(&ring), 2);
    }

    #[test]
    fn test_connectivity_number() {
        // N and E with the corner empty: a removable L
        let ring = [true, false, true, false, false, false, false, false];
        assert_eq!(connectivity_number(&ring), 1);

        // N and S: removing the centre splits the line
        let ring = [true, false, false, false, true, false, false, false];
        assert_eq!(connectivity_number(&ring), 2);
    }

    #[test]
    fn test_grid_is_padded() {
        let island = island_from_rows(&["##", "##"]);
        let grid = ThinningGrid::from_island(&island);
        assert_eq!((grid.width(), grid.height()), (4, 4));
        assert_eq!(grid.origin(), Pixel::new(-1, -1));
        assert!(!grid.get(0, 0));
        assert!(grid.get(1, 1));
        assert_eq!(grid.pixels(), island.pixels().clone());
    }

    #[test]
    fn test_staircase_removal() {
        let island = island_from_rows(&[
            "##...",
            ".##..",
            "..##.",
        ]);
        let mut grid = ThinningGrid::from_island(&island);
        let removed = grid.remove_staircases();
        assert_eq!(removed, 2);
        let skeleton = Island::from_pixels(grid.pixels(), Connectivity::Eight).unwrap();
        assert!(skeleton.is_connected());
        assert_eq!(skeleton.terminal_pixels().len(), 2);
    }

    #[test]
    fn test_every_strategy_keeps_small_islands() {
        let pair = island_from_rows(&["##"]);
        for kind in ThinningKind::iter() {
            let skeleton = skeletonize(&pair, &kind).unwrap();
            assert_eq!(skeleton.pixels(), pair.pixels());
        }
    }

    #[test]
    fn test_every_strategy_preserves_connectivity() {
        let blob = island_from_rows(&[
            "..#####.....",
            ".########...",
            "###########.",
            "############",
            "....####....",
            "....####....",
            "....####....",
        ]);
        for kind in ThinningKind::iter() {
            let skeleton = skeletonize(&blob, &kind).expect("skeleton stays connected");
            assert!(skeleton.is_connected(), "{kind} disconnected the blob");
            assert!(skeleton.len() < blob.len());
            assert!(skeleton.iter().all(|p| blob.contains(p)));
        }
    }

    #[test]
    fn test_square_block_does_not_vanish() {
        let block = island_from_rows(&["##", "##"]);
        for kind in ThinningKind::iter() {
            let skeleton = skeletonize(&block, &kind).unwrap();
            assert!(!skeleton.is_empty());
            assert!(skeleton.is_connected());
        }
    }

    #[test]
    fn test_thin_line_is_unchanged() {
        let line = island_from_rows(&["##########"]);
        for kind in ThinningKind::iter() {
            let skeleton = skeletonize(&line, &kind).unwrap();
            assert_eq!(skeleton.len(), 10);
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ThinningKind::ZhangSuen.name(), "zhang_suen");
        assert_eq!(ThinningKind::Hilditch.to_string(), "hilditch");
    }
}

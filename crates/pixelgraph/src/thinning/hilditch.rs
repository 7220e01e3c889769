use std::collections::BTreeSet;

use tracing::trace;

use super::{neighbour_count, transitions, Thinning, ThinningGrid, P2, P4, P6, P8};
use crate::types::Pixel;

/// Hilditch thinning.
///
/// A pixel is removable when 2 <= B <= 6, A = 1, and neither P2 nor P4 would be
/// left as the only link of a line running through P1.
#[derive(Debug, Clone, Copy, Default)]
pub struct HilditchThinning;

impl HilditchThinning {
    fn is_candidate(grid: &ThinningGrid, x: i32, y: i32) -> bool {
        let ring = grid.neighbourhood(x, y);
        let b = neighbour_count(&ring);
        if !(2..=6).contains(&b) || transitions(&ring) != 1 {
            return false;
        }
        if ring[P2] && ring[P4] && ring[P8] && transitions(&grid.neighbourhood(x, y - 1)) == 1 {
            return false;
        }
        if ring[P2] && ring[P4] && ring[P6] && transitions(&grid.neighbourhood(x + 1, y)) == 1 {
            return false;
        }
        true
    }
}

impl Thinning for HilditchThinning {
    fn name(&self) -> &'static str {
        "hilditch"
    }

    fn thin(&self, mut grid: ThinningGrid) -> BTreeSet<Pixel> {
        let mut pass = 0;
        loop {
            let candidates: Vec<(i32, i32)> = grid
                .foreground()
                .into_iter()
                .filter(|&(x, y)| Self::is_candidate(&grid, x, y))
                .collect();

            let mut removed = 0;
            for (x, y) in candidates {
                if grid.is_deletable(x, y) {
                    grid.set(x, y, false);
                    removed += 1;
                }
            }
            pass += 1;
            trace!(pass, removed, "hilditch pass");
            if removed == 0 {
                break;
            }
        }
        grid.remove_staircases();
        grid.pixels()
    }
}

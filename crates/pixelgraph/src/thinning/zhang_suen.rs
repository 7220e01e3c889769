use std::collections::BTreeSet;

use tracing::trace;

use super::{neighbour_count, transitions, Thinning, ThinningGrid, P2, P4, P6, P8};
use crate::types::Pixel;

/// Zhang-Suen two-subiteration thinning.
///
/// Candidates for each subiteration are chosen on a snapshot of the grid, then
/// deleted one by one only if they are still simple against the current grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZhangSuenThinning;

impl ZhangSuenThinning {
    fn candidates(grid: &ThinningGrid, second: bool) -> Vec<(i32, i32)> {
        grid.foreground()
            .into_iter()
            .filter(|&(x, y)| {
                let ring = grid.neighbourhood(x, y);
                let b = neighbour_count(&ring);
                if !(2..=6).contains(&b) || transitions(&ring) != 1 {
                    return false;
                }
                if second {
                    !(ring[P2] && ring[P4] && ring[P8]) && !(ring[P2] && ring[P6] && ring[P8])
                } else {
                    !(ring[P2] && ring[P4] && ring[P6]) && !(ring[P4] && ring[P6] && ring[P8])
                }
            })
            .collect()
    }
}

impl Thinning for ZhangSuenThinning {
    fn name(&self) -> &'static str {
        "zhang_suen"
    }

    fn thin(&self, mut grid: ThinningGrid) -> BTreeSet<Pixel> {
        let mut pass = 0;
        loop {
            let mut removed = 0;
            for second in [false, true] {
                for (x, y) in Self::candidates(&grid, second) {
                    if grid.is_deletable(x, y) {
                        grid.set(x, y, false);
                        removed += 1;
                    }
                }
            }
            pass += 1;
            trace!(pass, removed, "zhang-suen pass");
            if removed == 0 {
                break;
            }
        }
        grid.remove_staircases();
        grid.pixels()
    }
}

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::island::{Island, IslandList};
use crate::raster::BinaryRaster;
use crate::types::{Connectivity, Pixel};

/// Partition the foreground of `raster` into connected islands.
///
/// Seeds are taken in raster order and flooded with an explicit stack, so every
/// foreground pixel is visited exactly once. The caller's raster is not touched:
/// visited markers live on a private copy of the mask.
pub fn label_islands(raster: &BinaryRaster, connectivity: Connectivity) -> Result<IslandList> {
    if raster.is_empty() {
        return Err(GraphError::EmptyRaster {
            width: raster.width(),
            height: raster.height(),
        });
    }

    let mut unvisited = raster.data().to_vec();
    let width = raster.width() as usize;
    let offsets = connectivity.offsets();
    let mut islands = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..unvisited.len() {
        if !unvisited[seed] {
            continue;
        }
        unvisited[seed] = false;
        stack.push(Pixel::new((seed % width) as i32, (seed / width) as i32));

        let mut pixels = BTreeSet::new();
        while let Some(p) = stack.pop() {
            pixels.insert(p);
            for &(dx, dy) in offsets {
                let n = p.offset(dx, dy);
                if let Some(i) = raster.index(n.x, n.y) {
                    if unvisited[i] {
                        unvisited[i] = false;
                        stack.push(n);
                    }
                }
            }
        }
        islands.push(Island::from_component(pixels, connectivity));
    }

    debug!(
        islands = islands.len(),
        foreground = raster.foreground_count(),
        %connectivity,
        "labelled islands"
    );
    Ok(IslandList::new(islands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use imageproc::region_labelling::{connected_components, Connectivity as IpConnectivity};

    fn noisy_raster() -> BinaryRaster {
        BinaryRaster::from_rows(&[
            "##..#...#.",
            ".#..#..#..",
            "....##....",
            "#.......##",
            ".#.###..#.",
            "...#.#....",
            "...###..#.",
        ])
    }

    #[test]
    fn test_partition_property() {
        let raster = noisy_raster();
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let islands = label_islands(&raster, connectivity).expect("valid raster");

            let mut union = BTreeSet::new();
            for island in &islands {
                for p in island.iter() {
                    assert!(union.insert(p), "pixel {p} in two islands");
                }
                assert!(island.is_connected());
            }
            let foreground: BTreeSet<Pixel> = raster.foreground_pixels().collect();
            assert_eq!(union, foreground);
        }
    }

    #[test]
    fn test_connectivity_changes_island_count() {
        let raster = BinaryRaster::from_rows(&["#.", ".#"]);
        assert_eq!(label_islands(&raster, Connectivity::Eight).unwrap().len(), 1);
        assert_eq!(label_islands(&raster, Connectivity::Four).unwrap().len(), 2);
    }

    #[test]
    fn test_matches_imageproc_component_count() {
        let raster = noisy_raster();
        let image: GrayImage = raster.to_gray();
        for (ours, theirs) in [
            (Connectivity::Four, IpConnectivity::Four),
            (Connectivity::Eight, IpConnectivity::Eight),
        ] {
            let labels = connected_components(&image, theirs, Luma([0u8]));
            let expected = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
            let islands = label_islands(&raster, ours).unwrap();
            assert_eq!(islands.len(), expected);
        }
    }

    #[test]
    fn test_ring_with_hole_is_one_island() {
        let raster = BinaryRaster::from_rows(&["###", "#.#", "###"]);
        let islands = label_islands(&raster, Connectivity::Four).unwrap();
        assert_eq!(islands.len(), 1);
        assert_eq!(islands.total_pixels(), 8);
    }

    #[test]
    fn test_empty_foreground_is_not_an_error() {
        let raster = BinaryRaster::new(8, 8);
        let islands = label_islands(&raster, Connectivity::Eight).expect("blank raster is valid");
        assert!(islands.is_empty());
    }

    #[test]
    fn test_zero_size_raster_is_rejected() {
        let raster = BinaryRaster::new(0, 5);
        assert!(matches!(
            label_islands(&raster, Connectivity::Eight),
            Err(GraphError::EmptyRaster { width: 0, height: 5 })
        ));
    }

    #[test]
    fn test_caller_raster_untouched() {
        let raster = noisy_raster();
        let before = raster.clone();
        label_islands(&raster, Connectivity::Eight).unwrap();
        assert_eq!(raster, before);
    }
}

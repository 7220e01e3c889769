use std::collections::BTreeSet;

use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::types::{Pixel, ANGULAR_OFFSETS, ORTHOGONAL_FIRST_OFFSETS};

/// One erosion layer of an island.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRing {
    /// 1-based; the island boundary is layer 1
    pub layer: usize,
    pub pixels: BTreeSet<Pixel>,
}

impl PixelRing {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Split the ring into 8-connected pieces and order each one as a closed contour.
    ///
    /// Pieces come out in raster order of their first pixel. Within a piece the walk
    /// prefers orthogonal steps and jumps to the nearest unvisited pixel when stuck.
    pub fn contours(&self) -> Vec<Vec<Pixel>> {
        let mut remaining = self.pixels.clone();
        let mut contours = Vec::new();

        while let Some(seed) = remaining.pop_first() {
            let mut component = BTreeSet::from([seed]);
            let mut stack = vec![seed];
            while let Some(p) = stack.pop() {
                for &(dx, dy) in &ANGULAR_OFFSETS {
                    let n = p.offset(dx, dy);
                    if remaining.remove(&n) {
                        component.insert(n);
                        stack.push(n);
                    }
                }
            }
            contours.push(order_contour(component));
        }
        contours
    }
}

fn order_contour(mut unvisited: BTreeSet<Pixel>) -> Vec<Pixel> {
    let Some(mut current) = unvisited.pop_first() else {
        return Vec::new();
    };
    let mut ordered = vec![current];

    while !unvisited.is_empty() {
        let step = ORTHOGONAL_FIRST_OFFSETS
            .iter()
            .map(|&(dx, dy)| current.offset(dx, dy))
            .find(|n| unvisited.contains(n));

        let next = match step {
            Some(n) => n,
            None => {
                let mut nearest = None;
                for &p in &unvisited {
                    let d = p.distance(current);
                    if nearest.is_none_or(|(best, _)| d < best) {
                        nearest = Some((d, p));
                    }
                }
                match nearest {
                    Some((_, p)) => p,
                    None => break,
                }
            }
        };
        unvisited.remove(&next);
        ordered.push(next);
        current = next;
    }
    ordered
}

fn contour_polygon(contour: &[Pixel]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = contour
        .iter()
        .map(|p| Coord {
            x: f64::from(p.x),
            y: f64::from(p.y),
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// The outer boundary of an island split into its outline and hole contours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingOutline {
    pub outline: Vec<Pixel>,
    pub holes: Vec<Vec<Pixel>>,
}

/// Concentric erosion rings, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRingList {
    rings: Vec<PixelRing>,
}

impl PixelRingList {
    /// Empty layers are skipped; the rest are numbered from 1.
    pub fn from_layers(layers: Vec<BTreeSet<Pixel>>) -> Self {
        let rings = layers
            .into_iter()
            .filter(|pixels| !pixels.is_empty())
            .enumerate()
            .map(|(i, pixels)| PixelRing {
                layer: i + 1,
                pixels,
            })
            .collect();
        Self { rings }
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn rings(&self) -> &[PixelRing] {
        &self.rings
    }

    pub fn get(&self, index: usize) -> Option<&PixelRing> {
        self.rings.get(index)
    }

    pub fn outermost(&self) -> Option<&PixelRing> {
        self.rings.first()
    }

    pub fn innermost(&self) -> Option<&PixelRing> {
        self.rings.last()
    }

    /// Classify the contours of the outermost ring.
    ///
    /// The contour enclosing the largest area is the outline; contours strictly
    /// inside it are holes.
    pub fn outline(&self) -> Option<RingOutline> {
        use geo::{Area, Contains};

        let mut polygons: Vec<(Polygon<f64>, Vec<Pixel>)> = self
            .outermost()?
            .contours()
            .into_iter()
            .map(|contour| (contour_polygon(&contour), contour))
            .collect();

        polygons.sort_by(|a, b| {
            b.0.unsigned_area()
                .partial_cmp(&a.0.unsigned_area())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut iter = polygons.into_iter();
        let (outer_polygon, outline) = iter.next()?;
        let holes = iter
            .filter(|(polygon, _)| outer_polygon.contains(polygon))
            .map(|(_, contour)| contour)
            .collect();

        Some(RingOutline { outline, holes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::island::Island;
    use crate::raster::BinaryRaster;
    use crate::types::Connectivity;

    fn island_from_rows(rows: &[&str]) -> Island {
        let raster = BinaryRaster::from_rows(rows);
        Island::from_pixels(raster.foreground_pixels(), Connectivity::Eight)
            .expect("rows form one island")
    }

    fn thick_frame() -> Island {
        island_from_rows(&[
            "#########",
            "#########",
            "#########",
            "###...###",
            "###...###",
            "###...###",
            "#########",
            "#########",
            "#########",
        ])
    }

    #[test]
    fn test_ring_list_layers() {
        let mut island = thick_frame();
        let rings = island.ring_list();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings.outermost().map(PixelRing::len), Some(44));
        assert_eq!(rings.innermost().map(|r| r.layer), Some(2));

        let total: usize = rings.rings().iter().map(PixelRing::len).sum();
        assert_eq!(total, island.len());
    }

    #[test]
    fn test_outline_and_hole() {
        let mut island = thick_frame();
        let outline = island.ring_list().outline().expect("frame has an outline");
        assert_eq!(outline.outline.len(), 32);
        assert_eq!(outline.holes.len(), 1);
        assert_eq!(outline.holes[0].len(), 12);
    }

    #[test]
    fn test_contour_is_walked_in_order() {
        let ring = PixelRing {
            layer: 1,
            pixels: island_from_rows(&["###", "#.#", "###"]).pixels().clone(),
        };
        let contours = ring.contours();
        assert_eq!(contours.len(), 1);
        let contour = &contours[0];
        assert_eq!(contour.len(), 8);
        for pair in contour.windows(2) {
            assert!(pair[0].touches(pair[1]));
        }
        assert!(contour[contour.len() - 1].touches(contour[0]));
    }

    #[test]
    fn test_from_layers_skips_empty() {
        let list = PixelRingList::from_layers(vec![
            BTreeSet::from([Pixel::new(0, 0)]),
            BTreeSet::new(),
        ]);
        assert_eq!(list.len(), 1);
        assert!(PixelRingList::default().outline().is_none());
    }
}

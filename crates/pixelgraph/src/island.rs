use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GraphError, Result};
use crate::raster::BinaryRaster;
use crate::rings::PixelRingList;
use crate::thinning::{self, Thinning};
use crate::types::{
    mean_point, Connectivity, Pixel, PixelBox, ANGULAR_OFFSETS, ORTHOGONAL_OFFSETS,
};

/// A maximal connected set of foreground pixels.
///
/// Membership is fixed at construction. The value overlay (erosion layers,
/// visited markers) is the only mutable state and requires `&mut self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Island {
    pixels: BTreeSet<Pixel>,
    connectivity: Connectivity,
    values: BTreeMap<Pixel, i32>,
}

impl Island {
    /// Build an island from arbitrary pixels, checking they are non-empty and connected.
    pub fn from_pixels(
        pixels: impl IntoIterator<Item = Pixel>,
        connectivity: Connectivity,
    ) -> Result<Self> {
        let pixels: BTreeSet<Pixel> = pixels.into_iter().collect();
        if pixels.is_empty() {
            return Err(GraphError::EmptyIsland);
        }
        let island = Self::from_component(pixels, connectivity);
        if !island.is_connected() {
            return Err(GraphError::DisconnectedIsland);
        }
        Ok(island)
    }

    /// No connectivity check; the caller decides whether one is needed.
    pub(crate) fn from_component(pixels: BTreeSet<Pixel>, connectivity: Connectivity) -> Self {
        Self {
            pixels,
            connectivity,
            values: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &BTreeSet<Pixel> {
        &self.pixels
    }

    pub fn iter(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.pixels.iter().copied()
    }

    pub fn contains(&self, p: Pixel) -> bool {
        self.pixels.contains(&p)
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// First pixel in raster order.
    pub fn first_pixel(&self) -> Option<Pixel> {
        self.pixels.first().copied()
    }

    pub fn is_single_pixel(&self) -> bool {
        self.pixels.len() == 1
    }

    /// Neighbours under the island's own connectivity, in angular order.
    pub fn neighbours(&self, p: Pixel) -> Vec<Pixel> {
        self.present(p, self.connectivity.offsets())
    }

    pub fn orthogonal_neighbours(&self, p: Pixel) -> Vec<Pixel> {
        self.present(p, &ORTHOGONAL_OFFSETS)
    }

    /// Diagonal-inclusive neighbours regardless of connectivity.
    pub fn all_neighbours(&self, p: Pixel) -> Vec<Pixel> {
        self.present(p, &ANGULAR_OFFSETS)
    }

    pub(crate) fn present(&self, p: Pixel, offsets: &[(i32, i32)]) -> Vec<Pixel> {
        offsets
            .iter()
            .map(|&(dx, dy)| p.offset(dx, dy))
            .filter(|n| self.pixels.contains(n))
            .collect()
    }

    pub fn degree(&self, p: Pixel) -> usize {
        self.connectivity
            .offsets()
            .iter()
            .filter(|&&(dx, dy)| self.pixels.contains(&p.offset(dx, dy)))
            .count()
    }

    /// Pixels with exactly one neighbour: chain ends of a skeleton.
    pub fn terminal_pixels(&self) -> Vec<Pixel> {
        self.iter().filter(|&p| self.degree(p) == 1).collect()
    }

    pub fn is_connected(&self) -> bool {
        let Some(start) = self.first_pixel() else {
            return true;
        };
        let mut seen = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(p) = stack.pop() {
            for n in self.neighbours(p) {
                if seen.insert(n) {
                    stack.push(n);
                }
            }
        }
        seen.len() == self.pixels.len()
    }

    pub fn bounding_box(&self) -> Option<PixelBox> {
        PixelBox::from_pixels(&self.pixels)
    }

    pub fn centroid(&self) -> [f64; 2] {
        mean_point(&self.pixels).unwrap_or([0.0, 0.0])
    }

    pub fn value(&self, p: Pixel) -> i32 {
        self.values.get(&p).copied().unwrap_or(0)
    }

    /// Ignored for pixels outside the island.
    pub fn set_value(&mut self, p: Pixel, value: i32) {
        if self.pixels.contains(&p) {
            self.values.insert(p, value);
        }
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Pixels with at least one missing orthogonal neighbour.
    pub fn boundary_pixels(&self) -> BTreeSet<Pixel> {
        self.iter()
            .filter(|&p| self.orthogonal_neighbours(p).len() < 4)
            .collect()
    }

    /// One erosion step inward from `frontier`.
    ///
    /// Unlabelled orthogonal neighbours of the frontier are labelled `layer + 1`
    /// and returned. An empty result means the island is consumed.
    pub fn grow_from(&mut self, frontier: &BTreeSet<Pixel>, layer: i32) -> BTreeSet<Pixel> {
        let mut next = BTreeSet::new();
        for &p in frontier {
            for n in self.orthogonal_neighbours(p) {
                if self.value(n) == 0 && !frontier.contains(&n) {
                    next.insert(n);
                }
            }
        }
        for &n in &next {
            self.values.insert(n, layer + 1);
        }
        next
    }

    /// Erosion layers, outermost first. The overlay holds each pixel's layer (1-based).
    pub fn erosion_layers(&mut self) -> Vec<BTreeSet<Pixel>> {
        self.clear_values();
        let boundary = self.boundary_pixels();
        for &p in &boundary {
            self.values.insert(p, 1);
        }

        let mut layers = vec![boundary];
        let mut layer = 1;
        loop {
            let frontier = &layers[layers.len() - 1];
            let next = self.grow_from(&frontier.clone(), layer);
            if next.is_empty() {
                break;
            }
            layers.push(next);
            layer += 1;
        }
        layers
    }

    /// Local maxima of the erosion layer: an approximation of the medial axis.
    pub fn find_ridge(&mut self) -> BTreeSet<Pixel> {
        self.erosion_layers();
        self.iter()
            .filter(|&p| {
                let v = self.value(p);
                self.all_neighbours(p).iter().all(|&n| self.value(n) <= v)
            })
            .collect()
    }

    /// Concentric erosion rings, outermost first.
    pub fn ring_list(&mut self) -> PixelRingList {
        let layers = self.erosion_layers();
        PixelRingList::from_layers(layers)
    }

    /// The island as a tight local raster plus the global coordinate of its origin.
    pub fn to_raster(&self) -> (BinaryRaster, Pixel) {
        let Some(bbox) = self.bounding_box() else {
            return (BinaryRaster::new(0, 0), Pixel::new(0, 0));
        };
        let origin = Pixel::new(bbox.min_x, bbox.min_y);
        let raster = BinaryRaster::from_pixels(
            bbox.width(),
            bbox.height(),
            self.iter().map(|p| Pixel::new(p.x - origin.x, p.y - origin.y)),
        );
        (raster, origin)
    }

    pub fn skeletonize(&self, thinning: &dyn Thinning) -> Result<Island> {
        thinning::skeletonize(self, thinning)
    }
}

/// Islands from one labeling pass, in discovery (raster) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IslandList {
    islands: Vec<Island>,
}

impl IslandList {
    pub fn new(islands: Vec<Island>) -> Self {
        Self { islands }
    }

    pub fn len(&self) -> usize {
        self.islands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Island> {
        self.islands.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Island> {
        self.islands.iter()
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn into_vec(self) -> Vec<Island> {
        self.islands
    }

    pub fn total_pixels(&self) -> usize {
        self.islands.iter().map(Island::len).sum()
    }

    /// The first of the largest islands.
    pub fn largest(&self) -> Option<&Island> {
        self.islands
            .iter()
            .rev()
            .max_by_key(|island| island.len())
    }

    /// Stable: equal-sized islands keep discovery order.
    pub fn sort_by_size_descending(&mut self) {
        self.islands.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    /// Drop islands smaller than `min_pixels` (noise specks).
    pub fn retain_min_pixels(&mut self, min_pixels: usize) {
        self.islands.retain(|island| island.len() >= min_pixels);
    }

    /// Index of the island owning `p`, if any.
    pub fn island_containing(&self, p: Pixel) -> Option<usize> {
        self.islands.iter().position(|island| island.contains(p))
    }

    pub fn bounding_boxes(&self) -> Vec<PixelBox> {
        self.islands.iter().filter_map(Island::bounding_box).collect()
    }
}

impl IntoIterator for IslandList {
    type Item = Island;
    type IntoIter = std::vec::IntoIter<Island>;

    fn into_iter(self) -> Self::IntoIter {
        self.islands.into_iter()
    }
}

impl<'a> IntoIterator for &'a IslandList {
    type Item = &'a Island;
    type IntoIter = std::slice::Iter<'a, Island>;

    fn into_iter(self) -> Self::IntoIter {
        self.islands.iter()
    }
}

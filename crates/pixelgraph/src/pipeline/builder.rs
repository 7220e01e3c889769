use crate::{
    pipeline::Pipeline,
    simplify::{PolylineSimplifier, SimplifyMethod},
    thinning::{Thinning, ThinningKind},
    types::Connectivity,
};

/// Builder for creating processing pipelines with a fluent API
pub struct PipelineBuilder {
    connectivity: Connectivity,
    thinner: Option<Box<dyn Thinning>>,
    min_island_pixels: usize,
    node_tolerance: Option<f64>,
    max_crossing_turn_degrees: Option<f64>,
    simplifier: Option<(Box<dyn PolylineSimplifier>, f64)>,
    cycle_corner_epsilon: f64,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            connectivity: Connectivity::Eight,
            thinner: Some(Box::new(ThinningKind::default())),
            min_island_pixels: 1,
            node_tolerance: None,
            max_crossing_turn_degrees: None,
            simplifier: None,
            cycle_corner_epsilon: 1.0,
        }
    }

    /// Adjacency used when labelling islands
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Use one of the built-in thinning strategies
    pub fn thinning(self, kind: ThinningKind) -> Self {
        self.set_thinner(kind)
    }

    /// Set the thinning strategy (replaces any existing one)
    pub fn set_thinner<T>(mut self, thinner: T) -> Self
    where
        T: Thinning + 'static,
    {
        self.thinner = Some(Box::new(thinner));
        self
    }

    /// Treat every island as an existing skeleton
    pub fn skip_thinning(mut self) -> Self {
        self.thinner = None;
        self
    }

    pub fn min_island_pixels(mut self, pixels: usize) -> Self {
        self.min_island_pixels = pixels;
        self
    }

    /// Merge graph nodes closer than `tolerance` pixels
    pub fn with_node_compaction(mut self, tolerance: f64) -> Self {
        self.node_tolerance = Some(tolerance);
        self
    }

    /// Split four-way crossings whose turn stays under `max_turn_degrees`
    pub fn with_crossing_resolution(mut self, max_turn_degrees: f64) -> Self {
        self.max_crossing_turn_degrees = Some(max_turn_degrees);
        self
    }

    /// Add Douglas-Peucker simplification of every edge
    pub fn with_simplification(self, epsilon: f64) -> Self {
        self.with_simplifier(SimplifyMethod::DouglasPeucker, epsilon)
    }

    /// Add Visvalingam-Whyatt simplification of every edge
    pub fn with_vw_simplification(self, tolerance: f64) -> Self {
        self.with_simplifier(SimplifyMethod::VisvalingamWhyatt, tolerance)
    }

    /// Set the edge simplifier (replaces any existing one)
    pub fn with_simplifier<S>(mut self, simplifier: S, tolerance: f64) -> Self
    where
        S: PolylineSimplifier + 'static,
    {
        self.simplifier = Some((Box::new(simplifier), tolerance));
        self
    }

    /// Anchor placement tolerance for closed loops without junctions
    pub fn cycle_corner_epsilon(mut self, epsilon: f64) -> Self {
        self.cycle_corner_epsilon = epsilon;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            connectivity: self.connectivity,
            thinner: self.thinner,
            min_island_pixels: self.min_island_pixels,
            node_tolerance: self.node_tolerance,
            max_crossing_turn_degrees: self.max_crossing_turn_degrees,
            simplifier: self.simplifier,
            cycle_corner_epsilon: self.cycle_corner_epsilon,
        }
    }

    /// Already-thinned input, cleaned up and simplified
    pub fn build_for_skeletons(tolerance: f64, epsilon: f64) -> Pipeline {
        Self::new()
            .skip_thinning()
            .with_node_compaction(tolerance)
            .with_simplification(epsilon)
            .build()
    }

    /// Thinning, compaction, crossing resolution and simplification
    pub fn build_comprehensive(tolerance: f64, max_turn_degrees: f64, epsilon: f64) -> Pipeline {
        Self::new()
            .with_node_compaction(tolerance)
            .with_crossing_resolution(max_turn_degrees)
            .with_simplification(epsilon)
            .build()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thinning::HilditchThinning;

    #[test]
    fn test_defaults() {
        let info = PipelineBuilder::new().build().info();
        assert!(info.contains("eight connectivity"));
        assert!(info.contains("thinning zhang_suen"));
        assert!(info.contains("compaction off"));
    }

    #[test]
    fn test_custom_thinner_and_simplifier() {
        let info = PipelineBuilder::new()
            .set_thinner(HilditchThinning)
            .with_vw_simplification(0.5)
            .build()
            .info();
        assert!(info.contains("thinning hilditch"));
        assert!(info.contains("visvalingam_whyatt (0.5)"));
    }

    #[test]
    fn test_presets() {
        let info = PipelineBuilder::build_for_skeletons(1.5, 1.0).info();
        assert!(info.contains("thinning none"));
        assert!(info.contains("compaction 1.5"));

        let info = PipelineBuilder::build_comprehensive(2.0, 30.0, 1.0).info();
        assert!(info.contains("crossings 30"));
        assert!(info.contains("douglas_peucker (1)"));
    }
}

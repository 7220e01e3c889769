pub mod builder;

use image::GrayImage;
use serde::Serialize;
use tracing::{debug, info_span};

use crate::{
    config::TopologyConfig,
    error::Result,
    graph::{GraphBuilder, PixelGraph, UnresolvedCrossing},
    labeling::label_islands,
    raster::BinaryRaster,
    simplify::PolylineSimplifier,
    thinning::{skeletonize, Thinning},
    types::Connectivity,
};

/// Everything recovered from one raster.
#[derive(Debug, Clone)]
pub struct ExtractedTopology {
    pub width: u32,
    pub height: u32,
    /// Islands that survived size filtering
    pub island_count: usize,
    /// Nodes removed by compaction, over all islands
    pub merged_nodes: usize,
    pub graphs: Vec<PixelGraph>,
    pub unresolved: Vec<UnresolvedCrossing>,
}

impl ExtractedTopology {
    pub fn node_count(&self) -> usize {
        self.graphs.iter().map(|g| g.node_count()).sum()
    }

    pub fn edge_count(&self) -> usize {
        self.graphs.iter().map(|g| g.edge_count()).sum()
    }

    pub fn cycle_count(&self) -> usize {
        self.graphs.iter().filter(|g| g.is_single_cycle()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn summary(&self) -> TopologySummary {
        TopologySummary {
            width: self.width,
            height: self.height,
            islands: self.island_count,
            graphs: self.graphs.len(),
            nodes: self.node_count(),
            edges: self.edge_count(),
            cycles: self.cycle_count(),
            merged_nodes: self.merged_nodes,
            unresolved_crossings: self.unresolved.len(),
        }
    }
}

/// Counts only, for logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    pub width: u32,
    pub height: u32,
    pub islands: usize,
    pub graphs: usize,
    pub nodes: usize,
    pub edges: usize,
    pub cycles: usize,
    pub merged_nodes: usize,
    pub unresolved_crossings: usize,
}

/// Raster in, graphs out: labeling, thinning, graph building, then the
/// optional compaction, crossing and simplification stages.
pub struct Pipeline {
    connectivity: Connectivity,
    thinner: Option<Box<dyn Thinning>>,
    min_island_pixels: usize,
    node_tolerance: Option<f64>,
    max_crossing_turn_degrees: Option<f64>,
    simplifier: Option<(Box<dyn PolylineSimplifier>, f64)>,
    cycle_corner_epsilon: f64,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Build from a validated configuration.
    pub fn from_config(config: &TopologyConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::builder()
            .connectivity(config.connectivity)
            .min_island_pixels(config.min_island_pixels)
            .cycle_corner_epsilon(config.cycle_corner_epsilon);
        builder = if config.skeletonize {
            builder.thinning(config.thinning)
        } else {
            builder.skip_thinning()
        };
        if let Some(tolerance) = config.node_tolerance {
            builder = builder.with_node_compaction(tolerance);
        }
        if let Some(degrees) = config.max_crossing_turn_degrees {
            builder = builder.with_crossing_resolution(degrees);
        }
        if let Some(epsilon) = config.simplify_epsilon {
            builder = builder.with_simplifier(config.simplify_method, epsilon);
        }
        Ok(builder.build())
    }

    /// Process a binary raster through the entire pipeline
    pub fn process(&self, raster: &BinaryRaster) -> Result<ExtractedTopology> {
        let _span = info_span!("process", width = raster.width(), height = raster.height()).entered();

        let mut islands = label_islands(raster, self.connectivity)?;
        islands.retain_min_pixels(self.min_island_pixels);
        debug!(islands = islands.len(), pixels = islands.total_pixels(), "labelled");

        let mut graphs = Vec::with_capacity(islands.len());
        let mut unresolved = Vec::new();
        let mut merged_nodes = 0;
        for (index, island) in islands.iter().enumerate() {
            let skeleton = match &self.thinner {
                Some(thinner) => skeletonize(island, thinner.as_ref())?,
                None => island.clone(),
            };
            let mut graph = GraphBuilder::new(&skeleton)
                .cycle_epsilon(self.cycle_corner_epsilon)
                .build()?;

            let merged = match self.node_tolerance {
                Some(tolerance) => graph.compact_close_nodes(tolerance),
                None => 0,
            };
            merged_nodes += merged;
            debug!(
                island = index,
                pixels = island.len(),
                skeleton = skeleton.len(),
                merged,
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                cycle = graph.is_single_cycle(),
                "built graph"
            );

            match self.max_crossing_turn_degrees {
                Some(degrees) => {
                    let resolution = graph.resolve_cyclic_crossing(degrees)?;
                    graphs.extend(resolution.graphs);
                    unresolved.extend(resolution.unresolved);
                }
                None => graphs.push(graph),
            }
        }

        if let Some((simplifier, epsilon)) = &self.simplifier {
            for graph in &mut graphs {
                graph.simplify_edges_with(simplifier.as_ref(), *epsilon);
            }
        }

        let topology = ExtractedTopology {
            width: raster.width(),
            height: raster.height(),
            island_count: islands.len(),
            merged_nodes,
            graphs,
            unresolved,
        };
        debug!(summary = ?topology.summary(), "pipeline finished");
        Ok(topology)
    }

    /// Binarize with `threshold` (pixels above it are foreground) and process.
    pub fn process_image(&self, image: &GrayImage, threshold: u8) -> Result<ExtractedTopology> {
        self.process(&BinaryRaster::from_gray(image, threshold))
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        let thinning = self.thinner.as_ref().map_or("none", |t| t.name());
        let stage = |value: Option<f64>| value.map_or_else(|| "off".to_string(), |v| v.to_string());
        let simplify = self
            .simplifier
            .as_ref()
            .map_or_else(|| "off".to_string(), |(s, e)| format!("{} ({e})", s.name()));
        format!(
            "Pipeline: {} connectivity, thinning {}, min island {} px, compaction {}, crossings {}, simplification {}",
            self.connectivity,
            thinning,
            self.min_island_pixels,
            stage(self.node_tolerance),
            stage(self.max_crossing_turn_degrees),
            simplify
        )
    }
}

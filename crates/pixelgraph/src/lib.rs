//! # Pixel Graph Extraction Library
//!
//! Recovers the topology of a line drawing (chemical diagrams, flow charts,
//! plots) from a binary raster: islands of connected pixels are thinned to
//! skeletons, junction clusters are classified, and each skeleton is walked
//! into a graph of nodes and pixel-chain edges.
//!
//! ## Core Features
//!
//! - **Labeling**: 4- or 8-connected islands via iterative flood fill
//! - **Pluggable Thinning**: Zhang-Suen and Hilditch behind the [`Thinning`] trait
//! - **Nucleus Classification**: crosses, pass-throughs and packed junction clusters
//! - **Graph Building**: terminals, junctions and closed loops split at their corners
//! - **Resolution**: close-node compaction and splitting of lines that merely cross
//! - **Simplification**: Douglas-Peucker and Visvalingam-Whyatt edge polylines
//! - **GeoJSON Export**: edges as LineStrings, nodes as Points
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pixelgraph::Pipeline;
//! use image::open;
//!
//! let pipeline = Pipeline::builder()
//!     .with_node_compaction(2.0)
//!     .with_simplification(1.0)
//!     .build();
//!
//! let image = open("drawing.png")?.to_luma8();
//! let topology = pipeline.process_image(&image, 128)?;
//! println!("{}", topology.to_geojson_string()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Step by Step
//!
//! ```rust
//! use pixelgraph::{label_islands, BinaryRaster, Connectivity, PixelGraph, ThinningKind};
//!
//! let raster = BinaryRaster::from_rows(&[
//!     "...#...",
//!     "...#...",
//!     "#######",
//!     "...#...",
//!     "...#...",
//! ]);
//! let islands = label_islands(&raster, Connectivity::Eight)?;
//! let skeleton = islands.islands()[0].skeletonize(&ThinningKind::ZhangSuen)?;
//! let graph = PixelGraph::from_island(&skeleton)?;
//! assert_eq!(graph.terminals().count(), 4);
//! # Ok::<(), pixelgraph::GraphError>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod io;
pub mod island;
pub mod labeling;
pub mod nucleus;
pub mod pipeline;
pub mod raster;
pub mod rings;
pub mod simplify;
pub mod thinning;
pub mod types;

// Re-exports for convenience
pub use config::TopologyConfig;
pub use error::{GraphError, Result};
pub use graph::{
    CrossingResolution, Edge, EdgeId, GraphBuilder, Node, NodeId, NodeKind, PixelGraph,
    UnresolvedCrossing, UnresolvedReason,
};
pub use island::{Island, IslandList};
pub use labeling::label_islands;
pub use nucleus::{find_clusters, Nucleus, NucleusKind};
pub use pipeline::{builder::PipelineBuilder, ExtractedTopology, Pipeline, TopologySummary};
pub use raster::BinaryRaster;
pub use rings::{PixelRing, PixelRingList, RingOutline};
pub use simplify::{
    douglas_peucker, douglas_peucker_indices, DouglasPeuckerSimplifier, PolylineSimplifier,
    SimplifyMethod, VisvalingamWhyattSimplifier,
};
pub use thinning::{skeletonize, HilditchThinning, Thinning, ThinningGrid, ThinningKind, ZhangSuenThinning};
pub use types::{Connectivity, Pixel, PixelBox};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line_end_to_end() {
        let raster = BinaryRaster::from_rows(&["##########"]);
        let islands = label_islands(&raster, Connectivity::Eight).unwrap();
        assert_eq!(islands.len(), 1);

        let skeleton = skeletonize(&islands.islands()[0], &ThinningKind::ZhangSuen).unwrap();
        let mut graph = PixelGraph::from_island(&skeleton).unwrap();
        assert_eq!(graph.terminals().count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges()[0].len(), 10);

        graph.simplify_edges(1.0);
        assert_eq!(graph.edges()[0].points().len(), 2);
    }

    #[test]
    fn test_plus_sign_has_cross_centre() {
        let raster = BinaryRaster::from_rows(&[".#.", "###", ".#."]);
        let islands = label_islands(&raster, Connectivity::Eight).unwrap();
        let graph = PixelGraph::from_island(&islands.islands()[0]).unwrap();

        let centre = graph.node_at(Pixel::new(1, 1)).expect("centre is a node");
        assert_eq!(centre.nucleus, Some(NucleusKind::Cross));
        assert_eq!(centre.degree(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.edges().iter().all(|e| e.len() == 1));
        assert_eq!(graph.terminals().count(), 4);
    }

    #[test]
    fn test_square_outline_is_single_cycle() {
        let outline: Vec<Pixel> = (0..10)
            .flat_map(|i| [Pixel::new(i, 0), Pixel::new(i, 9), Pixel::new(0, i), Pixel::new(9, i)])
            .collect();
        let raster = BinaryRaster::from_pixels(10, 10, outline);
        let islands = label_islands(&raster, Connectivity::Eight).unwrap();
        let graph = PixelGraph::from_island(&islands.islands()[0]).unwrap();

        assert!(graph.is_single_cycle());
        assert_eq!(graph.terminals().count(), 0);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_crossing_lines_split() {
        let mut rows = vec!["....#...."; 4];
        rows.push("#########");
        rows.extend(vec!["....#...."; 4]);
        let raster = BinaryRaster::from_rows(&rows);
        let islands = label_islands(&raster, Connectivity::Eight).unwrap();
        let graph = PixelGraph::from_island(&islands.islands()[0]).unwrap();
        assert_eq!(graph.nodes_with_degree(4).count(), 1);

        let resolution = graph.resolve_cyclic_crossing(30.0).unwrap();
        assert_eq!(resolution.graphs.len(), 2);
        for part in &resolution.graphs {
            assert_eq!(part.terminals().count(), 2);
            assert_eq!(part.edge_count(), 1);
            assert_eq!(part.edges()[0].len(), 9);
        }
    }

    #[test]
    fn test_simplifier_scenarios() {
        let collinear = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        assert_eq!(douglas_peucker(&collinear, 1.0).len(), 2);

        let bent = [[0.0, 0.0], [1.0, 0.0], [2.0, 1.5], [3.0, 0.0], [4.0, 0.0]];
        assert_eq!(douglas_peucker(&bent, 1.0).len(), 3);
    }
}

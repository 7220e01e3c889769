pub mod builder;
pub mod compaction;
pub mod crossing;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use geo_types::{Coord, LineString};
use petgraph::unionfind::UnionFind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{GraphError, Result};
use crate::island::Island;
use crate::nucleus::NucleusKind;
use crate::simplify::{douglas_peucker, PolylineSimplifier};
use crate::types::{mean_point, Pixel, ANGULAR_OFFSETS};

pub use builder::GraphBuilder;
pub use crossing::{CrossingResolution, UnresolvedCrossing, UnresolvedReason};

pub type NodeId = usize;
pub type EdgeId = usize;

/// Role of a node in the graph.
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    /// No edges: a dot or a single pixel
    Isolated,
    /// Line end
    Terminal,
    /// Three or more branches, or a cluster kept as a node
    Junction,
    /// Corner splitting a closed cycle
    Anchor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub nucleus: Option<NucleusKind>,
    /// Owned pixels; empty for a line end whose pixel lies on its edge
    pub pixels: Vec<Pixel>,
    pub centroid: [f64; 2],
    /// Incident edges. A self-loop appears twice.
    pub edges: Vec<EdgeId>,
}

impl Node {
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == NodeKind::Terminal
    }

    pub fn is_junction(&self) -> bool {
        self.kind == NodeKind::Junction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub start: NodeId,
    pub end: NodeId,
    /// Ordered from the start node side to the end node side
    pub pixels: Vec<Pixel>,
    pub polyline: Option<Vec<[f64; 2]>>,
    pub cyclic: bool,
}

impl Edge {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn is_loop(&self) -> bool {
        self.start == self.end
    }

    /// The node at the other end, if `node` is one of the ends.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.start {
            Some(self.end)
        } else if node == self.end {
            Some(self.start)
        } else {
            None
        }
    }

    /// The simplified polyline if one exists, else the raw pixel centres.
    pub fn points(&self) -> Vec<[f64; 2]> {
        match &self.polyline {
            Some(polyline) => polyline.clone(),
            None => self.pixels.iter().map(|p| p.to_point()).collect(),
        }
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::new(
            self.points()
                .into_iter()
                .map(|[x, y]| Coord { x, y })
                .collect(),
        )
    }
}

/// Nodes and edges recovered from one skeleton island.
///
/// Node-owned pixels and edge pixels together cover the skeleton exactly once.
#[derive(Debug, Clone)]
pub struct PixelGraph {
    island: Island,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    single_cycle: bool,
}

impl PixelGraph {
    /// Build with default settings; see [`GraphBuilder`] for options.
    pub fn from_island(skeleton: &Island) -> Result<Self> {
        GraphBuilder::new(skeleton).build()
    }

    pub(crate) fn from_parts(island: Island, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Self {
            island,
            nodes,
            edges,
            single_cycle: false,
        };
        graph.single_cycle = graph.compute_single_cycle();
        graph
    }

    pub fn island(&self) -> &Island {
        &self.island
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when the island is one closed loop: no line ends, only crossing-like
    /// junctions, and at least one edge.
    pub fn is_single_cycle(&self) -> bool {
        self.single_cycle
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_terminal())
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_junction())
    }

    pub fn nodes_with_degree(&self, degree: usize) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.degree() == degree)
    }

    /// Node whose owned pixels include `p`.
    pub fn node_at(&self, p: Pixel) -> Option<&Node> {
        self.nodes.iter().find(|n| n.pixels.contains(&p))
    }

    pub(crate) fn compute_single_cycle(&self) -> bool {
        !self.edges.is_empty()
            && self.terminals().next().is_none()
            && self.junctions().all(|n| {
                matches!(n.nucleus, Some(NucleusKind::Cross | NucleusKind::SixSeven))
            })
    }

    /// Check that node pixels plus edge pixels equal the skeleton, each exactly once.
    pub fn verify_coverage(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for node in &self.nodes {
            for &p in &node.pixels {
                seen.insert(p);
            }
        }
        for edge in &self.edges {
            for &p in &edge.pixels {
                if !seen.insert(p) {
                    return Err(GraphError::PixelReassigned {
                        pixel: p,
                        edge: edge.id,
                    });
                }
            }
        }
        let missing: Vec<Pixel> = self.island.iter().filter(|p| !seen.contains(p)).collect();
        if let Some(&first) = missing.first() {
            return Err(GraphError::UncoveredPixels {
                count: missing.len(),
                first,
            });
        }
        Ok(())
    }

    /// Edge points with the end node centroids attached.
    pub fn edge_path(&self, edge: &Edge) -> Vec<[f64; 2]> {
        let mut path: Vec<[f64; 2]> = Vec::with_capacity(edge.pixels.len() + 2);
        let mut push = |point: [f64; 2]| {
            if path.last() != Some(&point) {
                path.push(point);
            }
        };
        if let Some(node) = self.nodes.get(edge.start) {
            push(node.centroid);
        }
        for p in &edge.pixels {
            push(p.to_point());
        }
        if let Some(node) = self.nodes.get(edge.end) {
            push(node.centroid);
        }
        path
    }

    /// Douglas-Peucker over every edge path.
    pub fn simplify_edges(&mut self, epsilon: f64) {
        let polylines: Vec<Vec<[f64; 2]>> = self
            .edges
            .iter()
            .map(|edge| douglas_peucker(&self.edge_path(edge), epsilon))
            .collect();
        for (edge, polyline) in self.edges.iter_mut().zip(polylines) {
            edge.polyline = Some(polyline);
        }
    }

    pub fn simplify_edges_with(&mut self, simplifier: &dyn PolylineSimplifier, epsilon: f64) {
        let polylines: Vec<Vec<[f64; 2]>> = self
            .edges
            .iter()
            .map(|edge| simplifier.simplify(&self.edge_path(edge), epsilon))
            .collect();
        for (edge, polyline) in self.edges.iter_mut().zip(polylines) {
            edge.polyline = Some(polyline);
        }
    }

    pub(crate) fn into_parts(self) -> (Island, Vec<Node>, Vec<Edge>) {
        (self.island, self.nodes, self.edges)
    }
}

/// Members of each union-find group, groups ordered by their smallest member.
pub(crate) fn union_groups(sets: UnionFind<usize>) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, root) in sets.into_labeling().into_iter().enumerate() {
        groups.entry(root).or_default().push(i);
    }
    let mut groups: Vec<Vec<usize>> = groups.into_values().collect();
    groups.sort_by_key(|members| members.first().copied());
    groups
}

/// Shortest 8-connected run through `pixels` that starts next to `from` and
/// ends next to `to`. A missing end leaves that side unconstrained. With no
/// pixels the run is empty when the two ends already touch.
pub(crate) fn trace_through(pixels: &[Pixel], from: Option<Pixel>, to: Option<Pixel>) -> Option<Vec<Pixel>> {
    let reaches = |p: Pixel, end: Option<Pixel>| end.is_none_or(|e| e.touches(p));
    if pixels.is_empty() {
        return match (from, to) {
            (Some(a), Some(b)) if a.touches(b) => Some(Vec::new()),
            _ => None,
        };
    }

    let inside: BTreeSet<Pixel> = pixels.iter().copied().collect();
    let mut came_from: BTreeMap<Pixel, Option<Pixel>> = BTreeMap::new();
    let mut queue = VecDeque::new();
    for &p in &inside {
        if reaches(p, from) {
            came_from.insert(p, None);
            queue.push_back(p);
        }
    }

    while let Some(current) = queue.pop_front() {
        if reaches(current, to) {
            let mut path = vec![current];
            let mut cursor = current;
            while let Some(&Some(previous)) = came_from.get(&cursor) {
                path.push(previous);
                cursor = previous;
            }
            path.reverse();
            return Some(path);
        }
        for &(dx, dy) in &ANGULAR_OFFSETS {
            let n = current.offset(dx, dy);
            if inside.contains(&n) && !came_from.contains_key(&n) {
                came_from.insert(n, Some(current));
                queue.push_back(n);
            }
        }
    }
    None
}

/// Centroid of owned pixels, or of a fallback pixel when the node owns none.
pub(crate) fn node_centroid(pixels: &[Pixel], fallback: Pixel) -> [f64; 2] {
    mean_point(pixels).unwrap_or_else(|| fallback.to_point())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::BinaryRaster;
    use crate::types::Connectivity;

    fn skeleton_from_rows(rows: &[&str]) -> Island {
        let raster = BinaryRaster::from_rows(rows);
        Island::from_pixels(raster.foreground_pixels(), Connectivity::Eight)
            .expect("rows form one island")
    }

    #[test]
    fn test_horizontal_line() {
        let skeleton = skeleton_from_rows(&["##########"]);
        let mut graph = PixelGraph::from_island(&skeleton).expect("line builds");

        assert_eq!(graph.terminals().count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges()[0].len(), 10);
        assert!(!graph.is_single_cycle());
        graph.verify_coverage().expect("line is covered");

        graph.simplify_edges(1.0);
        let polyline = graph.edges()[0].polyline.clone().expect("simplified");
        assert_eq!(polyline, vec![[0.0, 0.0], [9.0, 0.0]]);
    }

    #[test]
    fn test_edge_line_string_uses_polyline() {
        let skeleton = skeleton_from_rows(&["#####"]);
        let mut graph = PixelGraph::from_island(&skeleton).unwrap();
        assert_eq!(graph.edges()[0].to_line_string().0.len(), 5);
        graph.simplify_edges(0.5);
        assert_eq!(graph.edges()[0].to_line_string().0.len(), 2);
    }

    #[test]
    fn test_other_end() {
        let edge = Edge {
            id: 0,
            start: 3,
            end: 5,
            pixels: vec![Pixel::new(0, 0)],
            polyline: None,
            cyclic: false,
        };
        assert_eq!(edge.other_end(3), Some(5));
        assert_eq!(edge.other_end(5), Some(3));
        assert_eq!(edge.other_end(4), None);
    }

    #[test]
    fn test_trace_through_follows_neighbours() {
        let pixels = [
            Pixel::new(1, 0),
            Pixel::new(2, 1),
            Pixel::new(3, 0),
            Pixel::new(2, 2),
        ];
        let path = trace_through(&pixels, Some(Pixel::new(0, 0)), Some(Pixel::new(4, 0)))
            .expect("pixels link the two ends");
        assert_eq!(path, vec![Pixel::new(1, 0), Pixel::new(2, 1), Pixel::new(3, 0)]);
    }

    #[test]
    fn test_trace_through_needs_a_connected_run() {
        let pixels = [Pixel::new(1, 0), Pixel::new(3, 0)];
        assert_eq!(
            trace_through(&pixels, Some(Pixel::new(0, 0)), Some(Pixel::new(4, 0))),
            None
        );
        assert_eq!(
            trace_through(&[], Some(Pixel::new(0, 0)), Some(Pixel::new(1, 1))),
            Some(Vec::new())
        );
        assert_eq!(trace_through(&[], Some(Pixel::new(0, 0)), Some(Pixel::new(2, 0))), None);
    }
}

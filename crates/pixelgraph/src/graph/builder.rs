use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use super::{node_centroid, Edge, EdgeId, Node, NodeId, NodeKind, PixelGraph};
use crate::error::{GraphError, Result};
use crate::island::Island;
use crate::nucleus::{find_clusters, Nucleus, NucleusKind};
use crate::simplify::douglas_peucker_indices;
use crate::types::{Connectivity, Pixel, ANGULAR_OFFSETS, ORTHOGONAL_FIRST_OFFSETS};

/// Progress of a single walk from a node into the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Unvisited,
    Walking,
    NodeFound(NodeId),
    EdgeClosed,
    Done,
}

/// A thin cluster the walk passes straight through.
#[derive(Debug, Clone)]
struct PassThrough {
    order: Vec<Pixel>,
    exits: [Pixel; 2],
    used: bool,
}

/// Builds a [`PixelGraph`] from one skeleton island.
///
/// ```rust,no_run
/// use pixelgraph::{BinaryRaster, Connectivity, GraphBuilder, label_islands};
///
/// let raster = BinaryRaster::from_rows(&["#####"]);
/// let islands = label_islands(&raster, Connectivity::Eight)?;
/// let graph = GraphBuilder::new(&islands.islands()[0]).cycle_epsilon(1.5).build()?;
/// assert_eq!(graph.edge_count(), 1);
/// # Ok::<(), pixelgraph::GraphError>(())
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder<'a> {
    skeleton: &'a Island,
    cycle_epsilon: f64,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(skeleton: &'a Island) -> Self {
        Self {
            skeleton,
            cycle_epsilon: 1.0,
        }
    }

    /// Tolerance used to place corner anchors on a closed loop without junctions.
    pub fn cycle_epsilon(mut self, epsilon: f64) -> Self {
        self.cycle_epsilon = epsilon;
        self
    }

    pub fn build(self) -> Result<PixelGraph> {
        if self.skeleton.is_empty() {
            return Err(GraphError::EmptyIsland);
        }
        let skeleton = if self.skeleton.connectivity() == Connectivity::Eight {
            self.skeleton.clone()
        } else {
            Island::from_component(self.skeleton.pixels().clone(), Connectivity::Eight)
        };

        let mut walker = Walker::new(&skeleton);
        if let Some(p) = skeleton.first_pixel().filter(|_| skeleton.is_single_pixel()) {
            walker.add_node(NodeKind::Isolated, None, vec![p], p);
        } else {
            walker.seed_nodes();
            if walker.nodes.is_empty() {
                match walker.walk_cycle(self.cycle_epsilon) {
                    Err(GraphError::OpenCycle(at)) => {
                        debug!(%at, "loop does not close, anchoring it instead");
                        walker.release_pass_throughs();
                    }
                    other => other?,
                }
            } else {
                walker.walk_all()?;
            }
            walker.walk_leftovers()?;
            walker.check_coverage()?;
        }

        let graph = PixelGraph::from_parts(skeleton.clone(), walker.nodes, walker.edges);
        debug!(
            pixels = skeleton.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            single_cycle = graph.is_single_cycle(),
            "built pixel graph"
        );
        Ok(graph)
    }
}

struct Walker<'s> {
    skeleton: &'s Island,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    core_owner: BTreeMap<Pixel, NodeId>,
    terminal_at: BTreeMap<Pixel, NodeId>,
    pass_throughs: Vec<PassThrough>,
    pass_member: BTreeMap<Pixel, usize>,
    consumed: BTreeMap<Pixel, EdgeId>,
}

impl<'s> Walker<'s> {
    fn new(skeleton: &'s Island) -> Self {
        Self {
            skeleton,
            nodes: Vec::new(),
            edges: Vec::new(),
            core_owner: BTreeMap::new(),
            terminal_at: BTreeMap::new(),
            pass_throughs: Vec::new(),
            pass_member: BTreeMap::new(),
            consumed: BTreeMap::new(),
        }
    }

    fn add_node(
        &mut self,
        kind: NodeKind,
        nucleus: Option<NucleusKind>,
        pixels: Vec<Pixel>,
        fallback: Pixel,
    ) -> NodeId {
        let id = self.nodes.len();
        for &p in &pixels {
            self.core_owner.insert(p, id);
        }
        self.nodes.push(Node {
            id,
            kind,
            nucleus,
            centroid: node_centroid(&pixels, fallback),
            pixels,
            edges: Vec::new(),
        });
        id
    }

    /// One node per classified cluster and per line end.
    fn seed_nodes(&mut self) {
        let mut clustered = BTreeSet::new();
        for cluster in find_clusters(self.skeleton) {
            clustered.extend(cluster.iter().copied());
            let Some(&first) = cluster.first() else {
                continue;
            };
            let nucleus = Nucleus::classify(cluster, self.skeleton);
            trace!(kind = %nucleus.kind(), at = %first, "classified cluster");

            if let Nucleus::TwoWay { order, exits, .. } = &nucleus {
                let index = self.pass_throughs.len();
                for &p in order {
                    self.pass_member.insert(p, index);
                }
                self.pass_throughs.push(PassThrough {
                    order: order.clone(),
                    exits: *exits,
                    used: false,
                });
                continue;
            }

            let kind = match nucleus.kind() {
                NucleusKind::Dot => NodeKind::Isolated,
                NucleusKind::Terminal => NodeKind::Terminal,
                _ => NodeKind::Junction,
            };
            self.add_node(kind, Some(nucleus.kind()), nucleus.core_pixels(), first);
        }

        let ends: Vec<Pixel> = self
            .skeleton
            .terminal_pixels()
            .into_iter()
            .filter(|p| !clustered.contains(p))
            .collect();
        for p in ends {
            let id = self.add_node(NodeKind::Terminal, None, Vec::new(), p);
            self.terminal_at.insert(p, id);
        }
    }

    /// Walk from every line end, then from every port of every node.
    fn walk_all(&mut self) -> Result<()> {
        let ends: Vec<(Pixel, NodeId)> = self.terminal_at.iter().map(|(&p, &id)| (p, id)).collect();
        for (p, id) in ends {
            if !self.consumed.contains_key(&p) {
                self.walk(id, p)?;
            }
        }

        for id in 0..self.nodes.len() {
            for port in self.ports(id) {
                if !self.consumed.contains_key(&port) && !self.pass_member.contains_key(&port) {
                    self.walk(id, port)?;
                }
            }
        }
        Ok(())
    }

    /// Skeleton pixels touching the node's core, counter-clockwise around its centroid.
    fn ports(&self, id: NodeId) -> Vec<Pixel> {
        let node = &self.nodes[id];
        let ports: BTreeSet<Pixel> = node
            .pixels
            .iter()
            .flat_map(|&p| self.skeleton.all_neighbours(p))
            .filter(|n| !self.core_owner.contains_key(n))
            .collect();
        let mut ports: Vec<Pixel> = ports.into_iter().collect();
        let centroid = node.centroid;
        ports.sort_by(|a, b| {
            a.angle_from(centroid)
                .partial_cmp(&b.angle_from(centroid))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ports
    }

    fn walk(&mut self, start: NodeId, first: Pixel) -> Result<()> {
        let start_end = (self.terminal_at.get(&first) == Some(&start)).then_some(first);
        let mut path = Vec::new();
        let mut state = WalkState::Unvisited;

        loop {
            state = match state {
                WalkState::Unvisited => {
                    path.push(first);
                    WalkState::Walking
                }
                WalkState::Walking => self.advance(start, start_end, &mut path)?,
                WalkState::NodeFound(end) => {
                    self.close_edge(start, end, std::mem::take(&mut path))?;
                    WalkState::EdgeClosed
                }
                WalkState::EdgeClosed => WalkState::Done,
                WalkState::Done => return Ok(()),
            };
        }
    }

    /// One step of a walk: stop at a node, pass through a thin cluster, or move on.
    fn advance(
        &mut self,
        start: NodeId,
        start_end: Option<Pixel>,
        path: &mut Vec<Pixel>,
    ) -> Result<WalkState> {
        let Some(&current) = path.last() else {
            return Ok(WalkState::Done);
        };

        if let Some(&end) = self.terminal_at.get(&current) {
            if start_end != Some(current) {
                return Ok(WalkState::NodeFound(end));
            }
        }

        for &(dx, dy) in &ANGULAR_OFFSETS {
            if let Some(&owner) = self.core_owner.get(&current.offset(dx, dy)) {
                if owner != start || path.len() > 1 {
                    return Ok(WalkState::NodeFound(owner));
                }
            }
        }

        if self.enter_pass_through(current, path)? {
            return Ok(WalkState::Walking);
        }

        let leaving_start = path.len() == 1 && start_end.is_none();
        let start_core = &self.nodes[start].pixels;
        let next = ORTHOGONAL_FIRST_OFFSETS
            .iter()
            .map(|&(dx, dy)| current.offset(dx, dy))
            .find(|&n| {
                self.skeleton.contains(n)
                    && !path.contains(&n)
                    && !self.consumed.contains_key(&n)
                    && !self.core_owner.contains_key(&n)
                    && !self.pass_member.contains_key(&n)
                    && !(leaving_start && start_core.iter().any(|c| c.touches(n)))
            });

        match next {
            Some(n) => {
                trace!(from = %current, to = %n, "walk step");
                path.push(n);
                Ok(WalkState::Walking)
            }
            None => {
                let id = self.add_node(NodeKind::Terminal, None, Vec::new(), current);
                trace!(at = %current, node = id, "dead end");
                Ok(WalkState::NodeFound(id))
            }
        }
    }

    /// Append a whole thin cluster touching `current`, oriented away from it.
    fn enter_pass_through(&mut self, current: Pixel, path: &mut Vec<Pixel>) -> Result<bool> {
        let index = ANGULAR_OFFSETS
            .iter()
            .filter_map(|&(dx, dy)| self.pass_member.get(&current.offset(dx, dy)).copied())
            .find(|&i| !self.pass_throughs[i].used);
        let Some(index) = index else {
            return Ok(false);
        };

        let run = &mut self.pass_throughs[index];
        run.used = true;
        let forward = if current == run.exits[1] {
            false
        } else if current == run.exits[0] {
            true
        } else {
            run.order.first().is_some_and(|p| p.touches(current))
        };
        let mut order = run.order.clone();
        if !forward {
            order.reverse();
        }
        for p in order {
            if let Some(&edge) = self.consumed.get(&p) {
                return Err(GraphError::PixelReassigned { pixel: p, edge });
            }
            path.push(p);
        }
        Ok(true)
    }

    fn close_edge(&mut self, start: NodeId, end: NodeId, pixels: Vec<Pixel>) -> Result<()> {
        let id = self.edges.len();
        for &p in &pixels {
            if let Some(&edge) = self.consumed.get(&p) {
                return Err(GraphError::PixelReassigned { pixel: p, edge });
            }
            self.consumed.insert(p, id);
        }
        trace!(edge = id, start, end, pixels = pixels.len(), "closed edge");
        self.edges.push(Edge {
            id,
            start,
            end,
            pixels,
            polyline: None,
            cyclic: start == end,
        });
        self.nodes[start].edges.push(id);
        self.nodes[end].edges.push(id);
        Ok(())
    }

    /// An island without nodes is a closed loop: walk it once and split it at its corners.
    fn walk_cycle(&mut self, epsilon: f64) -> Result<()> {
        let Some(first) = self.skeleton.first_pixel() else {
            return Err(GraphError::EmptyIsland);
        };
        // start outside any pass-through so it is entered from one of its exits
        let seed = self
            .skeleton
            .iter()
            .find(|p| !self.pass_member.contains_key(p))
            .ok_or(GraphError::OpenCycle(first))?;
        let mut ring = vec![seed];
        loop {
            let Some(&current) = ring.last() else {
                break;
            };
            if self.enter_pass_through(current, &mut ring)? {
                continue;
            }
            let next = ORTHOGONAL_FIRST_OFFSETS
                .iter()
                .map(|&(dx, dy)| current.offset(dx, dy))
                .find(|&n| {
                    self.skeleton.contains(n)
                        && !ring.contains(&n)
                        && !self.pass_member.contains_key(&n)
                });
            match next {
                Some(n) => ring.push(n),
                None => break,
            }
        }

        let closed = ring.len() >= 3 && ring.last().is_some_and(|p| p.touches(seed));
        if !closed {
            return Err(GraphError::OpenCycle(seed));
        }
        if let Some(pos) = ring.iter().position(|&p| p == first) {
            ring.rotate_left(pos);
        }

        let corners = cycle_corners(&ring, epsilon);
        debug!(ring = ring.len(), corners = corners.len(), "split closed loop");

        let anchors: Vec<NodeId> = corners
            .iter()
            .map(|&i| self.add_node(NodeKind::Anchor, None, vec![ring[i]], ring[i]))
            .collect();

        for (k, &from) in corners.iter().enumerate() {
            let to = corners[(k + 1) % corners.len()];
            let pixels: Vec<Pixel> = if to > from {
                ring[from + 1..to].to_vec()
            } else {
                ring[from + 1..].iter().chain(&ring[..to]).copied().collect()
            };
            let end = anchors[(k + 1) % anchors.len()];
            self.close_edge(anchors[k], end, pixels)?;
        }
        Ok(())
    }

    /// Pixels the walks from line ends and ports never reached, such as small
    /// loops left by thinning. Each round anchors the first such pixel and walks
    /// out of it, so every round covers at least that pixel.
    fn walk_leftovers(&mut self) -> Result<()> {
        // clusters no walk passed through are walked as plain pixels
        let pass_throughs = &self.pass_throughs;
        self.pass_member.retain(|_, index| pass_throughs[*index].used);

        while let Some(seed) = self.uncovered().first().copied() {
            let id = self.add_node(NodeKind::Anchor, None, vec![seed], seed);
            for port in self.ports(id) {
                if !self.consumed.contains_key(&port) && !self.pass_member.contains_key(&port) {
                    self.walk(id, port)?;
                }
            }
            let node = &mut self.nodes[id];
            node.kind = match node.degree() {
                0 => NodeKind::Isolated,
                1 => NodeKind::Terminal,
                2 => NodeKind::Anchor,
                _ => NodeKind::Junction,
            };
            trace!(at = %seed, node = id, degree = node.degree(), "anchored leftover pixels");
        }
        Ok(())
    }

    fn release_pass_throughs(&mut self) {
        for run in &mut self.pass_throughs {
            run.used = false;
        }
    }

    fn uncovered(&self) -> Vec<Pixel> {
        self.skeleton
            .iter()
            .filter(|p| !self.consumed.contains_key(p) && !self.core_owner.contains_key(p))
            .collect()
    }

    fn check_coverage(&self) -> Result<()> {
        let missing = self.uncovered();
        match missing.first() {
            Some(&first) => Err(GraphError::UncoveredPixels {
                count: missing.len(),
                first,
            }),
            None => Ok(()),
        }
    }
}

/// Ring indices kept by Douglas-Peucker on the closed ring, minus corners that
/// touch the previous corner. Index 0 is always a corner.
fn cycle_corners(ring: &[Pixel], epsilon: f64) -> Vec<usize> {
    let mut points: Vec<[f64; 2]> = ring.iter().map(|p| p.to_point()).collect();
    points.push(ring[0].to_point());

    let mut corners: Vec<usize> = Vec::new();
    for i in douglas_peucker_indices(&points, epsilon) {
        if i >= ring.len() {
            continue;
        }
        match corners.last() {
            Some(&prev) if ring[prev].touches(ring[i]) => {}
            _ => corners.push(i),
        }
    }
    while corners.len() > 1 {
        let (Some(&last), Some(&first)) = (corners.last(), corners.first()) else {
            break;
        };
        if ring[last].touches(ring[first]) {
            corners.pop();
        } else {
            break;
        }
    }
    corners
}

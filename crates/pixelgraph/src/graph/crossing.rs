use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use petgraph::unionfind::UnionFind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, warn};

use super::{trace_through, union_groups, Edge, EdgeId, Node, NodeId, NodeKind, PixelGraph};
use crate::error::Result;
use crate::island::Island;
use crate::types::{mean_point, Connectivity, Pixel};

/// Pixels sampled from each edge end to estimate its direction.
const DIRECTION_SAMPLE: usize = 5;

/// The three ways to split four edge ends into two pass-throughs.
const PAIRINGS: [[(usize, usize); 2]; 3] = [[(0, 1), (2, 3)], [(0, 2), (1, 3)], [(0, 3), (1, 2)]];

/// Why a four-way node was kept as a junction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Display)]
#[serde(tag = "reason", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnresolvedReason {
    /// The best pairing still bends more than the allowed turn
    TooSharp { turn_degrees: f64 },
    /// One of the incident edges is a loop on the node itself
    SelfCrossing,
    /// The two pass-throughs meet again elsewhere, so no split is possible
    Connected,
    /// A pass cannot be traced through the node's own pixels
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UnresolvedCrossing {
    pub location: [f64; 2],
    #[serde(flatten)]
    pub reason: UnresolvedReason,
}

/// Outcome of [`PixelGraph::resolve_cyclic_crossing`].
#[derive(Debug, Clone)]
pub struct CrossingResolution {
    /// One graph per connected component after splitting
    pub graphs: Vec<PixelGraph>,
    /// Centroids of the crossings that were split
    pub resolved: Vec<[f64; 2]>,
    pub unresolved: Vec<UnresolvedCrossing>,
}

impl CrossingResolution {
    pub fn is_split(&self) -> bool {
        self.graphs.len() > 1
    }
}

/// An edge end: the edge and whether it is the edge's start.
type EdgeEnd = (EdgeId, bool);

#[derive(Debug, Clone)]
struct CrossingPlan {
    node: NodeId,
    pairs: [(EdgeEnd, EdgeEnd); 2],
    max_turn: f64,
}

impl PixelGraph {
    /// Split four-way nodes that are really two lines passing over each other.
    ///
    /// Each degree-4 node pairs its edge ends so the total turning angle is
    /// smallest. When the sharper of the two turns exceeds `max_turn_degrees`
    /// the node stays a junction. Splits whose two pass-throughs would still be
    /// connected through other parts of the graph are reverted. Each surviving
    /// crossing gives each pass-through its own 8-connected run through the
    /// node's pixels, and the graph is split into its connected components.
    /// Node pixels on neither run are dropped along with the node.
    ///
    /// Simplified polylines are dropped; simplify after resolving.
    pub fn resolve_cyclic_crossing(self, max_turn_degrees: f64) -> Result<CrossingResolution> {
        let mut unresolved = Vec::new();
        let mut plans = Vec::new();
        for node in self.nodes_with_degree(4) {
            if node.edges.iter().any(|&e| self.edges[e].is_loop()) {
                unresolved.push(UnresolvedCrossing {
                    location: node.centroid,
                    reason: UnresolvedReason::SelfCrossing,
                });
                continue;
            }
            let plan = self.plan_crossing(node);
            let turn_degrees = plan.max_turn.to_degrees();
            if turn_degrees > max_turn_degrees {
                unresolved.push(UnresolvedCrossing {
                    location: node.centroid,
                    reason: UnresolvedReason::TooSharp { turn_degrees },
                });
                continue;
            }
            if plan.pairs.iter().any(|&(a, b)| self.bridge(plan.node, a, b).is_none()) {
                unresolved.push(UnresolvedCrossing {
                    location: node.centroid,
                    reason: UnresolvedReason::Detached,
                });
                continue;
            }
            plans.push(plan);
        }

        // reverting only ever joins more edges, so repeat until nothing changes
        loop {
            let sets = self.pass_through_sets(&plans);
            let before = plans.len();
            let (kept, reverted): (Vec<CrossingPlan>, Vec<CrossingPlan>) =
                plans.into_iter().partition(|plan| {
                    let [(a, _), (c, _)] = plan.pairs;
                    sets.find(a.0) != sets.find(c.0)
                });
            for plan in reverted {
                unresolved.push(UnresolvedCrossing {
                    location: self.nodes[plan.node].centroid,
                    reason: UnresolvedReason::Connected,
                });
            }
            plans = kept;
            if plans.len() == before {
                break;
            }
        }

        for crossing in &unresolved {
            warn!(
                x = crossing.location[0],
                y = crossing.location[1],
                reason = %crossing.reason,
                "crossing left unresolved"
            );
        }

        if plans.is_empty() {
            return Ok(CrossingResolution {
                graphs: vec![self],
                resolved: Vec::new(),
                unresolved,
            });
        }

        let resolved: Vec<[f64; 2]> = plans.iter().map(|p| self.nodes[p.node].centroid).collect();
        let graphs = self.split_at(&plans)?;
        debug!(
            resolved = resolved.len(),
            unresolved = unresolved.len(),
            graphs = graphs.len(),
            "resolved crossings"
        );
        Ok(CrossingResolution {
            graphs,
            resolved,
            unresolved,
        })
    }

    fn edge_end(&self, edge: EdgeId, node: NodeId) -> EdgeEnd {
        (edge, self.edges[edge].start == node)
    }

    fn end_node(&self, end: EdgeEnd) -> NodeId {
        let edge = &self.edges[end.0];
        if end.1 { edge.start } else { edge.end }
    }

    /// Vector from `centre` to the mean of the pixels nearest this end.
    fn end_direction(&self, end: EdgeEnd, centre: [f64; 2]) -> [f64; 2] {
        let edge = &self.edges[end.0];
        let sample: Vec<Pixel> = if end.1 {
            edge.pixels.iter().take(DIRECTION_SAMPLE).copied().collect()
        } else {
            edge.pixels.iter().rev().take(DIRECTION_SAMPLE).copied().collect()
        };
        let [x, y] = mean_point(&sample).unwrap_or_else(|| {
            let far = if end.1 { edge.end } else { edge.start };
            self.nodes[far].centroid
        });
        [x - centre[0], y - centre[1]]
    }

    fn plan_crossing(&self, node: &Node) -> CrossingPlan {
        let ends: Vec<EdgeEnd> = node.edges.iter().map(|&e| self.edge_end(e, node.id)).collect();
        let directions: BTreeMap<EdgeEnd, [f64; 2]> = ends
            .iter()
            .map(|&end| (end, self.end_direction(end, node.centroid)))
            .collect();
        let turn = |a: EdgeEnd, b: EdgeEnd| turn_angle(directions[&a], directions[&b]);

        let mut best: Option<([(EdgeEnd, EdgeEnd); 2], f64, f64)> = None;
        for pairing in PAIRINGS {
            let pairs = pairing.map(|(i, j)| (ends[i], ends[j]));
            let turns = pairs.map(|(a, b)| turn(a, b));
            let total = turns[0] + turns[1];
            if best.as_ref().is_none_or(|&(_, t, _)| total < t) {
                best = Some((pairs, total, turns[0].max(turns[1])));
            }
        }
        let (pairs, _, max_turn) = best.unwrap_or(([(ends[0], ends[1]), (ends[2], ends[3])], 0.0, PI));
        CrossingPlan {
            node: node.id,
            pairs,
            max_turn,
        }
    }

    /// Edge groups that stay joined once the planned crossings are split.
    fn pass_through_sets(&self, plans: &[CrossingPlan]) -> UnionFind<EdgeId> {
        let planned: BTreeSet<NodeId> = plans.iter().map(|p| p.node).collect();
        let mut sets = UnionFind::new(self.edges.len());
        for node in self.nodes.iter().filter(|n| !planned.contains(&n.id)) {
            for pair in node.edges.windows(2) {
                sets.union(pair[0], pair[1]);
            }
        }
        for plan in plans {
            for (a, b) in plan.pairs {
                sets.union(a.0, b.0);
            }
        }
        sets
    }

    /// Edge pixel at this end, next to the node.
    fn end_pixel(&self, end: EdgeEnd) -> Option<Pixel> {
        let pixels = &self.edges[end.0].pixels;
        if end.1 { pixels.first() } else { pixels.last() }.copied()
    }

    /// Node pixels linking the `from` end to the `to` end, each touching the next.
    fn bridge(&self, node: NodeId, from: EdgeEnd, to: EdgeEnd) -> Option<Vec<Pixel>> {
        let (a, b) = (self.end_pixel(from)?, self.end_pixel(to)?);
        trace_through(&self.nodes[node].pixels, Some(a), Some(b))
    }

    fn split_at(self, plans: &[CrossingPlan]) -> Result<Vec<PixelGraph>> {
        let mut partner: BTreeMap<EdgeEnd, (EdgeEnd, Vec<Pixel>)> = BTreeMap::new();
        for plan in plans {
            for (a, b) in plan.pairs {
                let bridge = self.bridge(plan.node, a, b).unwrap_or_default();
                let mut back = bridge.clone();
                back.reverse();
                partner.insert(a, (b, bridge));
                partner.insert(b, (a, back));
            }
        }

        let planned: BTreeSet<NodeId> = plans.iter().map(|p| p.node).collect();
        let mut renumber: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        let mut nodes: Vec<Node> = Vec::new();
        for node in self.nodes.iter().filter(|n| !planned.contains(&n.id)) {
            renumber.insert(node.id, nodes.len());
            nodes.push(Node {
                id: nodes.len(),
                edges: Vec::new(),
                ..node.clone()
            });
        }

        let mut edges: Vec<Edge> = Vec::new();
        let mut visited = vec![false; self.edges.len()];
        for e in 0..self.edges.len() {
            if visited[e] {
                continue;
            }

            // rewind to the start of the chain this edge belongs to
            let origin: EdgeEnd = (e, true);
            let mut entry = origin;
            let mut closed = false;
            for _ in 0..self.edges.len() {
                let Some(&(previous_exit, _)) = partner.get(&entry) else {
                    break;
                };
                let previous_entry = (previous_exit.0, !previous_exit.1);
                if previous_entry == origin {
                    closed = true;
                    break;
                }
                entry = previous_entry;
            }
            if closed {
                entry = origin;
            }

            let first = entry;
            let mut pixels: Vec<Pixel> = Vec::new();
            let last = loop {
                visited[entry.0] = true;
                let edge = &self.edges[entry.0];
                if entry.1 {
                    pixels.extend(edge.pixels.iter().copied());
                } else {
                    pixels.extend(edge.pixels.iter().rev().copied());
                }
                let exit = (entry.0, !entry.1);
                match partner.get(&exit) {
                    Some((next, bridge)) => {
                        pixels.extend(bridge.iter().copied());
                        if *next == first {
                            break None;
                        }
                        entry = *next;
                    }
                    None => break Some(self.end_node(exit)),
                }
            };

            let (start, end) = match last {
                Some(last) => (renumber[&self.end_node(first)], renumber[&last]),
                None if pixels.is_empty() => continue,
                None => {
                    // a closed pass-through gets a corner anchor at its first pixel
                    let anchor = pixels.remove(0);
                    let id = nodes.len();
                    nodes.push(Node {
                        id,
                        kind: NodeKind::Anchor,
                        nucleus: None,
                        pixels: vec![anchor],
                        centroid: anchor.to_point(),
                        edges: Vec::new(),
                    });
                    (id, id)
                }
            };
            edges.push(Edge {
                id: edges.len(),
                start,
                end,
                pixels,
                polyline: None,
                cyclic: start == end,
            });
        }

        split_components(nodes, edges)
    }
}

/// Turn needed to go in along `a` and out along `b`; zero for a straight pass.
fn turn_angle(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dot = a[0] * b[0] + a[1] * b[1];
    let cross = a[0] * b[1] - a[1] * b[0];
    PI - cross.abs().atan2(dot)
}

fn split_components(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Vec<PixelGraph>> {
    let mut sets = UnionFind::new(nodes.len());
    for edge in &edges {
        sets.union(edge.start, edge.end);
    }
    let groups = union_groups(sets);

    let mut graphs = Vec::with_capacity(groups.len());
    for members in &groups {
        let local: BTreeMap<NodeId, NodeId> = members
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        let mut part_nodes: Vec<Node> = members
            .iter()
            .enumerate()
            .map(|(i, &id)| Node {
                id: i,
                edges: Vec::new(),
                ..nodes[id].clone()
            })
            .collect();
        let mut part_edges: Vec<Edge> = Vec::new();
        for edge in edges.iter().filter(|e| local.contains_key(&e.start)) {
            let id = part_edges.len();
            let (start, end) = (local[&edge.start], local[&edge.end]);
            part_nodes[start].edges.push(id);
            part_nodes[end].edges.push(id);
            part_edges.push(Edge {
                id,
                start,
                end,
                ..edge.clone()
            });
        }

        let pixels = part_nodes
            .iter()
            .flat_map(|n| n.pixels.iter().copied())
            .chain(part_edges.iter().flat_map(|e| e.pixels.iter().copied()))
            .collect();
        let island = Island::from_component(pixels, Connectivity::Eight);
        let graph = PixelGraph::from_parts(island, part_nodes, part_edges);
        graph.verify_coverage()?;
        graphs.push(graph);
    }
    Ok(graphs)
}

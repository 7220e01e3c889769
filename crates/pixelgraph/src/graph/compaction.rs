use std::collections::BTreeSet;

use petgraph::unionfind::UnionFind;
use tracing::debug;

use super::{trace_through, union_groups, Edge, Node, NodeId, NodeKind, PixelGraph};
use crate::island::Island;
use crate::types::Pixel;

impl PixelGraph {
    /// Merge nodes whose centroids lie within `tolerance` of each other.
    ///
    /// Close pairs are taken nearest first, and two groups only merge when
    /// every member of one is within `tolerance` of every member of the other,
    /// so a chain of nodes each close to the next does not collapse into one.
    /// A self-loop that only exists because its two ends were merged folds into
    /// the merged node when it is no longer than `tolerance` pixels. A merged
    /// node left with exactly two distinct edges is dissolved when its pixels
    /// link the two edges: the shortest such run joins them and the node's
    /// other pixels leave the graph and its island. Edge pixels stay
    /// 8-connected and the node count never grows. Returns the number of nodes
    /// removed.
    pub fn compact_close_nodes(&mut self, tolerance: f64) -> usize {
        let before = self.nodes.len();
        let distance = |i: usize, j: usize| {
            let [ax, ay] = self.nodes[i].centroid;
            let [bx, by] = self.nodes[j].centroid;
            (ax - bx).hypot(ay - by)
        };

        let mut close: Vec<(f64, usize, usize)> = Vec::new();
        for i in 0..before {
            for j in i + 1..before {
                let d = distance(i, j);
                if d <= tolerance {
                    close.push((d, i, j));
                }
            }
        }
        close.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut sets = UnionFind::new(before);
        let mut members: Vec<Vec<usize>> = (0..before).map(|i| vec![i]).collect();
        let mut joined = false;
        for (_, i, j) in close {
            let (ri, rj) = (sets.find_mut(i), sets.find_mut(j));
            if ri == rj {
                continue;
            }
            let linked = members[ri]
                .iter()
                .all(|&a| members[rj].iter().all(|&b| distance(a, b) <= tolerance));
            if !linked {
                continue;
            }
            sets.union(ri, rj);
            let root = sets.find_mut(ri);
            let moved = std::mem::take(&mut members[if root == ri { rj } else { ri }]);
            members[root].extend(moved);
            joined = true;
        }
        if !joined {
            return 0;
        }

        let groups = union_groups(sets);

        let mut remap = vec![0; before];
        let mut nodes: Vec<Node> = Vec::with_capacity(groups.len());
        let mut merged: Vec<bool> = Vec::with_capacity(groups.len());
        for members in &groups {
            let id = nodes.len();
            for &m in members {
                remap[m] = id;
            }
            nodes.push(merge_nodes(id, members.iter().map(|&m| &self.nodes[m])));
            merged.push(members.len() > 1);
        }

        let mut absorbed = 0;
        let mut edges: Vec<Edge> = Vec::with_capacity(self.edges.len());
        for edge in std::mem::take(&mut self.edges) {
            let (start, end) = (remap[edge.start], remap[edge.end]);
            let collapsed = start == end && edge.start != edge.end;
            if collapsed && edge.len() as f64 <= tolerance {
                nodes[start].pixels.extend(edge.pixels);
                absorbed += 1;
                continue;
            }
            let touched = merged[start] || merged[end];
            edges.push(Edge {
                start,
                end,
                cyclic: start == end,
                polyline: if touched { None } else { edge.polyline },
                ..edge
            });
        }

        let mut pruned: BTreeSet<Pixel> = BTreeSet::new();
        let mut dissolved = vec![false; nodes.len()];
        for id in 0..nodes.len() {
            if !merged[id] {
                continue;
            }
            nodes[id].pixels.sort();
            nodes[id].pixels.dedup();

            let incident: Vec<usize> = edges
                .iter()
                .enumerate()
                .filter(|(_, e)| e.start == id || e.end == id)
                .map(|(i, _)| i)
                .collect();
            let [a, b] = incident[..] else {
                continue;
            };
            if edges[a].is_loop() || edges[b].is_loop() {
                continue;
            }

            let (from_end, to_end) = (end_at(&edges[a], id), end_at(&edges[b], id));
            let Some(bridge) = trace_through(&nodes[id].pixels, from_end, to_end) else {
                continue;
            };

            let second = edges.remove(b);
            let first = edges.remove(a);
            let (mut pixels, from) = into_node(first, id);
            let (tail, to) = out_of_node(second, id);
            pruned.extend(
                std::mem::take(&mut nodes[id].pixels)
                    .into_iter()
                    .filter(|p| !bridge.contains(p)),
            );
            pixels.extend(bridge);
            pixels.extend(tail);
            edges.push(Edge {
                id: 0,
                start: from,
                end: to,
                pixels,
                polyline: None,
                cyclic: from == to,
            });
            dissolved[id] = true;
        }

        let mut renumber = vec![0; nodes.len()];
        let mut kept: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut kept_merged: Vec<bool> = Vec::with_capacity(nodes.len());
        for (old, mut node) in nodes.into_iter().enumerate() {
            if dissolved[old] {
                continue;
            }
            renumber[old] = kept.len();
            node.id = kept.len();
            node.edges.clear();
            kept.push(node);
            kept_merged.push(merged[old]);
        }
        for (i, edge) in edges.iter_mut().enumerate() {
            edge.id = i;
            edge.start = renumber[edge.start];
            edge.end = renumber[edge.end];
            kept[edge.start].edges.push(i);
            kept[edge.end].edges.push(i);
        }
        for (node, _) in kept.iter_mut().zip(&kept_merged).filter(|&(_, &m)| m) {
            node.kind = match node.degree() {
                0 => NodeKind::Isolated,
                1 => NodeKind::Terminal,
                2 => NodeKind::Anchor,
                _ => NodeKind::Junction,
            };
        }

        if !pruned.is_empty() {
            let remaining = self.island.iter().filter(|p| !pruned.contains(p)).collect();
            self.island = Island::from_component(remaining, self.island.connectivity());
        }
        self.nodes = kept;
        self.edges = edges;
        self.single_cycle = self.compute_single_cycle();

        let removed = before - self.nodes.len();
        debug!(
            before,
            after = self.nodes.len(),
            absorbed,
            dissolved = dissolved.iter().filter(|&&d| d).count(),
            pruned = pruned.len(),
            "compacted close nodes"
        );
        removed
    }
}

/// One node standing in for a group. Pixels are unioned and the centroid is
/// the mean of the member centroids.
fn merge_nodes<'a>(id: NodeId, members: impl Iterator<Item = &'a Node>) -> Node {
    let members: Vec<&Node> = members.collect();
    if let [single] = members[..] {
        return Node { id, ..single.clone() };
    }
    let count = members.len() as f64;
    let (sx, sy) = members
        .iter()
        .fold((0.0, 0.0), |(sx, sy), n| (sx + n.centroid[0], sy + n.centroid[1]));
    Node {
        id,
        kind: NodeKind::Junction,
        nucleus: members.iter().find_map(|n| n.nucleus),
        pixels: members.iter().flat_map(|n| n.pixels.iter().copied()).collect(),
        centroid: [sx / count, sy / count],
        edges: Vec::new(),
    }
}

/// Edge pixels ordered so they end at `node`, with the node at the far end.
fn into_node(edge: Edge, node: NodeId) -> (Vec<Pixel>, NodeId) {
    if edge.end == node {
        (edge.pixels, edge.start)
    } else {
        let mut pixels = edge.pixels;
        pixels.reverse();
        (pixels, edge.end)
    }
}

/// Edge pixels ordered so they start at `node`, with the node at the far end.
fn out_of_node(edge: Edge, node: NodeId) -> (Vec<Pixel>, NodeId) {
    if edge.start == node {
        (edge.pixels, edge.end)
    } else {
        let mut pixels = edge.pixels;
        pixels.reverse();
        (pixels, edge.start)
    }
}

/// The edge pixel next to `node`.
fn end_at(edge: &Edge, node: NodeId) -> Option<Pixel> {
    if edge.end == node {
        edge.pixels.last().copied()
    } else {
        edge.pixels.first().copied()
    }
}

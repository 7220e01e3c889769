use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::warn;

use crate::island::Island;
use crate::types::{PixelBox, Pixel, ANGULAR_OFFSETS, ORTHOGONAL_FIRST_OFFSETS, ORTHOGONAL_OFFSETS};

/// Pattern a junction cluster was classified as.
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NucleusKind {
    /// No exits: an isolated blob
    Dot,
    /// One exit: a blob at the end of a line
    Terminal,
    /// Four-way crossing with a single orthogonal centre
    Cross,
    /// Two exits through a thin cluster: a pass-through, not a node
    TwoWay,
    /// Six or seven pixels packed in a 3x3 box
    SixSeven,
    /// Any other junction of three or more branches
    Junction,
}

/// A classified junction cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nucleus {
    Dot {
        pixels: BTreeSet<Pixel>,
    },
    Terminal {
        pixels: BTreeSet<Pixel>,
        exit: Pixel,
    },
    Cross {
        centre: Pixel,
        /// Cluster members other than the centre; they belong to edges
        released: Vec<Pixel>,
        exits: Vec<Pixel>,
    },
    TwoWay {
        pixels: BTreeSet<Pixel>,
        /// Members ordered from the pixel touching `exits[0]` to the one touching `exits[1]`
        order: Vec<Pixel>,
        exits: [Pixel; 2],
    },
    SixSeven {
        pixels: BTreeSet<Pixel>,
        exits: Vec<Pixel>,
    },
    Junction {
        pixels: BTreeSet<Pixel>,
        exits: Vec<Pixel>,
    },
}

impl Nucleus {
    /// Classify one cluster found by [`find_clusters`].
    ///
    /// Rules apply in order: orthogonal centre (Cross), exit count (Dot, Terminal),
    /// thin pass-through (TwoWay), packed 3x3 (SixSeven), anything else (Junction).
    /// A centre is a member whose four orthogonal neighbours are all members. Two
    /// centres need at least eight pixels, so only knots larger than a nucleus
    /// have them; those are kept whole as a Junction.
    pub fn classify(cluster: BTreeSet<Pixel>, skeleton: &Island) -> Self {
        let exits = cluster_exits(&cluster, skeleton);

        let centres: Vec<Pixel> = cluster
            .iter()
            .copied()
            .filter(|&p| {
                ORTHOGONAL_OFFSETS
                    .iter()
                    .all(|&(dx, dy)| cluster.contains(&p.offset(dx, dy)))
            })
            .collect();

        match centres.as_slice() {
            [] => {}
            &[centre] => {
                let released = cluster.iter().copied().filter(|&p| p != centre).collect();
                return Self::Cross {
                    centre,
                    released,
                    exits,
                };
            }
            [first, ..] => {
                warn!(
                    at = %first,
                    centres = centres.len(),
                    size = cluster.len(),
                    "cluster has several orthogonal centres, keeping it as a junction"
                );
                return Self::Junction {
                    pixels: cluster,
                    exits,
                };
            }
        }

        match exits.as_slice() {
            [] => return Self::Dot { pixels: cluster },
            &[exit] => return Self::Terminal { pixels: cluster, exit },
            &[a, b] if is_thin(&cluster) => match flatten(&cluster, a, b) {
                Some(order) => {
                    return Self::TwoWay {
                        pixels: cluster,
                        order,
                        exits: [a, b],
                    };
                }
                None => {
                    warn!(
                        at = %cluster.first().copied().unwrap_or(a),
                        size = cluster.len(),
                        "two-way cluster has no pass-through order, keeping it as a node"
                    );
                    return Self::Junction {
                        pixels: cluster,
                        exits,
                    };
                }
            },
            _ => {}
        }

        let packed = PixelBox::from_pixels(&cluster)
            .is_some_and(|bbox| bbox.width() <= 3 && bbox.height() <= 3);
        if packed && (6..=7).contains(&cluster.len()) {
            return Self::SixSeven {
                pixels: cluster,
                exits,
            };
        }

        Self::Junction {
            pixels: cluster,
            exits,
        }
    }

    pub fn kind(&self) -> NucleusKind {
        match self {
            Self::Dot { .. } => NucleusKind::Dot,
            Self::Terminal { .. } => NucleusKind::Terminal,
            Self::Cross { .. } => NucleusKind::Cross,
            Self::TwoWay { .. } => NucleusKind::TwoWay,
            Self::SixSeven { .. } => NucleusKind::SixSeven,
            Self::Junction { .. } => NucleusKind::Junction,
        }
    }

    /// Pixels the graph node will own. Empty for a pass-through.
    pub fn core_pixels(&self) -> Vec<Pixel> {
        match self {
            Self::Cross { centre, .. } => vec![*centre],
            Self::TwoWay { .. } => Vec::new(),
            Self::Dot { pixels }
            | Self::Terminal { pixels, .. }
            | Self::SixSeven { pixels, .. }
            | Self::Junction { pixels, .. } => pixels.iter().copied().collect(),
        }
    }

    /// Every member of the original cluster.
    pub fn pixels(&self) -> BTreeSet<Pixel> {
        match self {
            Self::Cross {
                centre, released, ..
            } => released.iter().copied().chain([*centre]).collect(),
            Self::Dot { pixels }
            | Self::Terminal { pixels, .. }
            | Self::TwoWay { pixels, .. }
            | Self::SixSeven { pixels, .. }
            | Self::Junction { pixels, .. } => pixels.clone(),
        }
    }

    pub fn exits(&self) -> Vec<Pixel> {
        match self {
            Self::Dot { .. } => Vec::new(),
            Self::Terminal { exit, .. } => vec![*exit],
            Self::TwoWay { exits, .. } => exits.to_vec(),
            Self::Cross { exits, .. }
            | Self::SixSeven { exits, .. }
            | Self::Junction { exits, .. } => exits.clone(),
        }
    }

    /// Whether the cluster becomes a graph node.
    pub fn is_node(&self) -> bool {
        !matches!(self, Self::TwoWay { .. })
    }
}

/// Group junction candidates (degree 3 or more) into 8-connected clusters.
///
/// Degree-2 pixels whose two neighbours both lie in one cluster are absorbed into
/// it, repeatedly, so that small loops inside a junction do not become edges.
pub fn find_clusters(skeleton: &Island) -> Vec<BTreeSet<Pixel>> {
    let mut remaining: BTreeSet<Pixel> = skeleton
        .iter()
        .filter(|&p| skeleton.degree(p) >= 3)
        .collect();

    let mut clusters = Vec::new();
    while let Some(seed) = remaining.pop_first() {
        let mut cluster = BTreeSet::from([seed]);
        let mut stack = vec![seed];
        while let Some(p) = stack.pop() {
            for &(dx, dy) in &ANGULAR_OFFSETS {
                let n = p.offset(dx, dy);
                if remaining.remove(&n) {
                    cluster.insert(n);
                    stack.push(n);
                }
            }
        }
        clusters.push(cluster);
    }

    for cluster in &mut clusters {
        loop {
            let bridges: BTreeSet<Pixel> = cluster
                .iter()
                .flat_map(|&p| skeleton.all_neighbours(p))
                .filter(|n| !cluster.contains(n))
                .filter(|&n| {
                    let around = skeleton.all_neighbours(n);
                    around.len() == 2 && around.iter().all(|m| cluster.contains(m))
                })
                .collect();
            if bridges.is_empty() {
                break;
            }
            cluster.extend(bridges);
        }
    }
    clusters
}

/// Skeleton pixels outside the cluster that touch it, in raster order.
fn cluster_exits(cluster: &BTreeSet<Pixel>, skeleton: &Island) -> Vec<Pixel> {
    let exits: BTreeSet<Pixel> = cluster
        .iter()
        .flat_map(|&p| skeleton.all_neighbours(p))
        .filter(|n| !cluster.contains(n))
        .collect();
    exits.into_iter().collect()
}

/// Every member has at most two neighbours inside the cluster.
fn is_thin(cluster: &BTreeSet<Pixel>) -> bool {
    cluster.iter().all(|&p| {
        ANGULAR_OFFSETS
            .iter()
            .filter(|&&(dx, dy)| cluster.contains(&p.offset(dx, dy)))
            .count()
            <= 2
    })
}

/// Order the cluster as a chain from a member touching `from` to one touching `to`.
fn flatten(cluster: &BTreeSet<Pixel>, from: Pixel, to: Pixel) -> Option<Vec<Pixel>> {
    // orthogonal contact with the exit first
    let mut starts: Vec<Pixel> = cluster.iter().copied().filter(|p| p.touches(from)).collect();
    starts.sort_by_key(|p| !p.touches_orthogonally(from));

    for start in starts {
        let mut path = vec![start];
        let mut used = BTreeSet::from([start]);
        if extend_chain(cluster, to, &mut path, &mut used) {
            return Some(path);
        }
    }
    None
}

fn extend_chain(
    cluster: &BTreeSet<Pixel>,
    to: Pixel,
    path: &mut Vec<Pixel>,
    used: &mut BTreeSet<Pixel>,
) -> bool {
    let Some(&current) = path.last() else {
        return false;
    };
    if path.len() == cluster.len() {
        return current.touches(to);
    }
    for &(dx, dy) in &ORTHOGONAL_FIRST_OFFSETS {
        let next = current.offset(dx, dy);
        if !cluster.contains(&next) || used.contains(&next) {
            continue;
        }
        path.push(next);
        used.insert(next);
        if extend_chain(cluster, to, path, used) {
            return true;
        }
        path.pop();
        used.remove(&next);
    }
    false
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

    fn classify_single(rows: &[&str]) -> Nucleus {
        let skeleton = skeleton_from_rows(rows);
        let mut clusters = find_clusters(&skeleton);
        assert_eq!(clusters.len(), 1, "expected one cluster");
        Nucleus::classify(clusters.remove(0), &skeleton)
    }

    #[test]
    fn test_plus_centre_is_cross() {
        let nucleus = classify_single(&[".#.", "###", ".#."]);
        assert_eq!(nucleus.kind(), NucleusKind::Cross);
        assert_eq!(nucleus.core_pixels(), vec![Pixel::new(1, 1)]);
        assert_eq!(nucleus.pixels().len(), 5);
    }

    #[test]
    fn test_long_armed_plus_is_cross_with_four_exits() {
        let nucleus = classify_single(&[
            "..#..",
            "..#..",
            "#####",
            "..#..",
            "..#..",
        ]);
        assert_eq!(nucleus.kind(), NucleusKind::Cross);
        assert_eq!(nucleus.exits().len(), 4);
    }

    #[test]
    fn test_tee_is_junction() {
        let nucleus = classify_single(&[
            "#####",
            "..#..",
            "..#..",
        ]);
        assert_eq!(nucleus.kind(), NucleusKind::Junction);
        assert_eq!(nucleus.exits().len(), 3);
        assert!(nucleus.is_node());
    }

    #[test]
    fn test_hook_is_two_way() {
        let nucleus = classify_single(&[
            "...##..",
            "###.#..",
            "....#..",
            "....#..",
        ]);
        let Nucleus::TwoWay { order, exits, .. } = &nucleus else {
            panic!("expected a two-way cluster, got {:?}", nucleus.kind());
        };
        assert!(order.first().is_some_and(|p| p.touches(exits[0])));
        assert!(order.last().is_some_and(|p| p.touches(exits[1])));
        assert!(nucleus.core_pixels().is_empty());
        assert!(!nucleus.is_node());
    }

    #[test]
    fn test_blob_without_exits_is_dot() {
        let nucleus = classify_single(&["##", "##"]);
        assert_eq!(nucleus.kind(), NucleusKind::Dot);
        assert!(nucleus.exits().is_empty());
    }

    #[test]
    fn test_blob_at_line_end_is_terminal() {
        let nucleus = classify_single(&["##....", "######"]);
        assert_eq!(nucleus.kind(), NucleusKind::Terminal);
        assert_eq!(nucleus.exits().len(), 1);
    }

    #[test]
    fn test_packed_three_by_three_is_six_seven() {
        let nucleus = classify_single(&[
            "#.....",
            "#.....",
            "##....",
            "######",
        ]);
        assert_eq!(nucleus.kind(), NucleusKind::SixSeven);
        assert_eq!(nucleus.core_pixels().len(), 6);
    }

    #[test]
    fn test_two_orthogonal_centres_make_one_junction() {
        let nucleus = classify_single(&[
            ".##.",
            "####",
            ".##.",
        ]);
        assert_eq!(nucleus.kind(), NucleusKind::Junction);
        assert_eq!(nucleus.core_pixels().len(), 8);
        assert!(nucleus.is_node());
    }

    #[test]
    fn test_knot_with_arms_keeps_every_exit() {
        let nucleus = classify_single(&[
            "..#..#..",
            "..#..#..",
            "..####..",
            "########",
            "..####..",
            "..#..#..",
            "..#..#..",
        ]);
        assert_eq!(nucleus.kind(), NucleusKind::Junction);
        assert_eq!(nucleus.exits().len(), 6);
    }

    #[test]
    fn test_bridges_are_absorbed() {
        let skeleton = skeleton_from_rows(&[
            "...##..",
            "###.#..",
            "....#..",
            "....#..",
        ]);
        let clusters = find_clusters(&skeleton);
        assert_eq!(clusters.len(), 1);
        // (4, 0) has degree 2 but both its neighbours are junction candidates
        assert_eq!(skeleton.degree(Pixel::new(4, 0)), 2);
        assert!(clusters[0].contains(&Pixel::new(4, 0)));
        assert_eq!(clusters[0].len(), 3);
    }

    #[test]
    fn test_diagonal_crossing_is_single_pixel_junction() {
        let nucleus = classify_single(&[
            "#...#",
            ".#.#.",
            "..#..",
            ".#.#.",
            "#...#",
        ]);
        assert_eq!(nucleus.kind(), NucleusKind::Junction);
        assert_eq!(nucleus.core_pixels(), vec![Pixel::new(2, 2)]);
        assert_eq!(nucleus.exits().len(), 4);
    }

    #[test]
    fn test_plain_line_has_no_clusters() {
        let skeleton = skeleton_from_rows(&["##########"]);
        assert!(find_clusters(&skeleton).is_empty());
    }
}

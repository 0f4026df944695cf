//! Two-dimensional k-d tree for nearest-neighbour lookups
//!
//! Distances are Euclidean in whatever units the points are given in (raw
//! degrees for the fusion join). Among equidistant points the one that came
//! first in build order wins, so results are stable for a given input order.

use std::cmp::Ordering;

/// Nearest point found by [`KdTree::nearest`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Position of the point in the slice the tree was built from
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug, Clone)]
struct Node {
    point: [f64; 2],
    index: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Static k-d tree over `(x, y)` points
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    /// Build a balanced tree by splitting on the median, alternating axes
    pub fn build(points: &[(f64, f64)]) -> Self {
        let mut order: Vec<(usize, [f64; 2])> = points
            .iter()
            .enumerate()
            .map(|(index, &(x, y))| (index, [x, y]))
            .collect();

        let mut tree = KdTree {
            nodes: Vec::with_capacity(points.len()),
            root: None,
        };
        tree.root = tree.build_subtree(&mut order, 0);
        tree
    }

    fn build_subtree(&mut self, points: &mut [(usize, [f64; 2])], depth: usize) -> Option<usize> {
        if points.is_empty() {
            return None;
        }

        let axis = depth % 2;
        points.sort_by(|a, b| a.1[axis].total_cmp(&b.1[axis]).then(a.0.cmp(&b.0)));
        let median = points.len() / 2;
        let (index, point) = points[median];

        let slot = self.nodes.len();
        self.nodes.push(Node {
            point,
            index,
            axis,
            left: None,
            right: None,
        });

        let (below, rest) = points.split_at_mut(median);
        let left = self.build_subtree(below, depth + 1);
        let right = self.build_subtree(&mut rest[1..], depth + 1);
        self.nodes[slot].left = left;
        self.nodes[slot].right = right;

        Some(slot)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Single nearest neighbour (`k = 1`) of `query`; `None` only for an empty tree
    pub fn nearest(&self, query: (f64, f64)) -> Option<Neighbour> {
        let query = [query.0, query.1];
        let mut best: Option<(f64, usize)> = None;
        self.search(self.root, &query, &mut best);
        best.map(|(squared, index)| Neighbour {
            index,
            distance: squared.sqrt(),
        })
    }

    fn search(&self, slot: Option<usize>, query: &[f64; 2], best: &mut Option<(f64, usize)>) {
        let Some(node) = slot.map(|s| &self.nodes[s]) else {
            return;
        };

        let dx = node.point[0] - query[0];
        let dy = node.point[1] - query[1];
        let candidate = (dx * dx + dy * dy, node.index);
        if is_better(candidate, *best) {
            *best = Some(candidate);
        }

        let diff = query[node.axis] - node.point[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.search(near, query, best);

        // Equal distance on the far side can still win on build order
        if best.map_or(true, |(squared, _)| diff * diff <= squared) {
            self.search(far, query, best);
        }
    }
}

fn is_better(candidate: (f64, usize), best: Option<(f64, usize)>) -> bool {
    match best {
        None => true,
        Some(current) => match candidate.0.total_cmp(&current.0) {
            Ordering::Less => true,
            Ordering::Equal => candidate.1 < current.1,
            Ordering::Greater => false,
        },
    }
}

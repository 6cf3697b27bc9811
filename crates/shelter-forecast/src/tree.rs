//! CART regression tree, the building block of the occupancy forest.
//!
//! Splits minimise the summed squared error of the two children (the MSE
//! criterion). Nodes live in a flat arena; children always have larger
//! indices than their parent, and node `0` is the root.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::ForecastConfig;
use crate::error::{ForecastError, ForecastResult};
use crate::rng::XorShift64;

/// Below this summed squared error a node is treated as pure.
const PURE_NODE_SSE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// TreeParams
// ---------------------------------------------------------------------------

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; `None` for unlimited.
    pub max_depth: Option<usize>,
    /// Minimum samples needed to split a node.
    pub min_samples_split: usize,
    /// Minimum samples each child must keep.
    pub min_samples_leaf: usize,
    /// Features examined per split.
    pub max_features: usize,
}

impl TreeParams {
    /// Tree limits taken from a validated [`ForecastConfig`].
    pub fn from_config(cfg: &ForecastConfig) -> Self {
        TreeParams {
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split,
            min_samples_leaf: cfg.min_samples_leaf,
            max_features: cfg.features_per_split(),
        }
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::from_config(&ForecastConfig::default())
    }
}

// ---------------------------------------------------------------------------
// TreeNode
// ---------------------------------------------------------------------------

/// One arena node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Terminal node predicting the mean label of its samples.
    Leaf {
        /// Predicted value.
        value: f64,
        /// Training samples that reached this leaf.
        samples: usize,
    },
    /// Internal node routing `x[feature] <= threshold` to `left`.
    Split {
        /// Feature column index.
        feature: usize,
        /// Decision threshold.
        threshold: f64,
        /// Arena index of the `<=` child.
        left: usize,
        /// Arena index of the `>` child.
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

// ---------------------------------------------------------------------------
// RegressionTree
// ---------------------------------------------------------------------------

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples`.
    ///
    /// `samples` may repeat indices (bootstrap draws); each occurrence counts
    /// as one sample. `rng` drives feature sub-sampling when
    /// `params.max_features` is below the column count.
    ///
    /// `samples` must be non-empty and every index must be a row of `x`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: &[usize],
        params: &TreeParams,
        rng: &mut XorShift64,
    ) -> Self {
        debug_assert!(!samples.is_empty(), "cannot grow a tree on zero samples");

        let mut nodes = vec![TreeNode::Leaf { value: 0.0, samples: 0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, samples.to_vec(), 0)];

        while let Some((id, idx, depth)) = stack.pop() {
            let (sum, sse) = sum_and_sse(y, &idx);
            nodes[id] = TreeNode::Leaf { value: sum / idx.len() as f64, samples: idx.len() };

            let depth_ok = params.max_depth.map_or(true, |d| depth < d);
            let size_ok = idx.len() >= params.min_samples_split
                && idx.len() >= 2 * params.min_samples_leaf;
            if !depth_ok || !size_ok || sse <= PURE_NODE_SSE {
                continue;
            }

            let Some(best) = best_split(x, y, &idx, params, rng) else {
                continue;
            };

            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                idx.iter().copied().partition(|&i| x[[i, best.feature]] <= best.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(TreeNode::Leaf { value: 0.0, samples: 0 });
            nodes.push(TreeNode::Leaf { value: 0.0, samples: 0 });
            nodes[id] = TreeNode::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
            };
            stack.push((right, right_idx, depth + 1));
            stack.push((left, left_idx, depth + 1));
        }

        RegressionTree { nodes }
    }

    /// Predict one row. `row` must have as many columns as the training data.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split { feature, threshold, left, right } => {
                    id = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    /// Check the arena invariants that [`RegressionTree::predict_row`] relies
    /// on: at least one node, split features below `n_features`, and children
    /// strictly after their parent and inside the arena.
    ///
    /// Trees grown by [`RegressionTree::fit`] always pass. Trees read back
    /// from disk may not.
    pub fn validate(&self, n_features: usize) -> ForecastResult<()> {
        if self.nodes.is_empty() {
            return Err(ForecastError::invalid_model("tree has no nodes"));
        }
        let len = self.nodes.len();
        for (id, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { feature, left, right, .. } = *node {
                if feature >= n_features {
                    return Err(ForecastError::invalid_model(format!(
                        "node {id} splits on feature {feature} of {n_features}"
                    )));
                }
                for child in [left, right] {
                    if child <= id || child >= len {
                        return Err(ForecastError::invalid_model(format!(
                            "node {id} points to child {child} (arena holds {len} nodes)"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Arena nodes, root first.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Total number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, TreeNode::Leaf { .. })).count()
    }

    /// Length of the longest root-to-leaf path (a lone root has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, d)) = stack.pop() {
            max_depth = max_depth.max(d);
            if let TreeNode::Split { left, right, .. } = self.nodes[id] {
                stack.push((left, d + 1));
                stack.push((right, d + 1));
            }
        }
        max_depth
    }
}

fn sum_and_sse(y: ArrayView1<'_, f64>, idx: &[usize]) -> (f64, f64) {
    let n = idx.len() as f64;
    let sum: f64 = idx.iter().map(|&i| y[i]).sum();
    let mean = sum / n;
    let sse = idx.iter().map(|&i| (y[i] - mean).powi(2)).sum();
    (sum, sse)
}

/// Lowest-SSE split over the candidate features, or `None` when every
/// candidate feature is constant or no split respects `min_samples_leaf`.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    idx: &[usize],
    params: &TreeParams,
    rng: &mut XorShift64,
) -> Option<Candidate> {
    let n_features = x.ncols();
    let mut features: Vec<usize> = (0..n_features).collect();
    if params.max_features < n_features {
        rng.shuffle(&mut features);
        features.truncate(params.max_features.max(1));
    }

    let n = idx.len();
    let min_leaf = params.min_samples_leaf;
    let total_sum: f64 = idx.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();

    let mut best: Option<Candidate> = None;
    let mut sorted = idx.to_vec();

    for &f in &features {
        sorted.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 1..n {
            let yi = y[sorted[k - 1]];
            left_sum += yi;
            left_sq += yi * yi;

            let lo = x[[sorted[k - 1], f]];
            let hi = x[[sorted[k], f]];
            if lo >= hi || k < min_leaf || n - k < min_leaf {
                continue;
            }

            let nl = k as f64;
            let nr = (n - k) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / nl).max(0.0)
                + (right_sq - right_sum * right_sum / nr).max(0.0);

            if best.map_or(true, |b| sse < b.sse) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(Candidate { feature: f, threshold, sse });
            }
        }
    }

    best
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2};

    fn all(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    fn two_leaf_tree(feature: usize, left: usize, right: usize) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split { feature, threshold: 0.5, left, right },
                TreeNode::Leaf { value: 1.0, samples: 1 },
                TreeNode::Leaf { value: 2.0, samples: 1 },
            ],
        }
    }

    #[test]
    fn fitted_tree_validates() {
        let x = Array2::from_shape_fn((16, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(16, |i| (i % 4) as f64);
        let tree =
            RegressionTree::fit(x.view(), y.view(), &all(16), &TreeParams::default(), &mut XorShift64::new(3));
        assert!(tree.validate(2).is_ok());
        assert!(two_leaf_tree(0, 1, 2).validate(1).is_ok());
    }

    #[test]
    fn malformed_arenas_are_invalid() {
        let broken = [
            (RegressionTree { nodes: Vec::new() }, 6),
            (two_leaf_tree(6, 1, 2), 6),
            (two_leaf_tree(0, 1, 3), 6),
            (two_leaf_tree(0, 0, 2), 6),
        ];
        for (tree, n_features) in broken {
            assert!(
                matches!(tree.validate(n_features), Err(ForecastError::InvalidModel { .. })),
                "{tree:?} should be rejected"
            );
        }
    }

    #[test]
    fn step_function_is_learned_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 50.0, 50.0, 50.0];
        let params = TreeParams { max_features: 1, ..TreeParams::default() };
        let tree = RegressionTree::fit(x.view(), y.view(), &all(6), &params, &mut XorShift64::new(1));

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_abs_diff_eq!(tree.predict_row(array![2.5].view()), 5.0);
        assert_abs_diff_eq!(tree.predict_row(array![11.5].view()), 50.0);
        match tree.nodes()[0] {
            TreeNode::Split { threshold, .. } => assert_abs_diff_eq!(threshold, 6.5),
            other => panic!("root should split, got {other:?}"),
        }
    }

    #[test]
    fn constant_target_yields_single_leaf() {
        let x = Array2::from_shape_fn((8, 3), |(i, j)| (i * 3 + j) as f64);
        let y = Array1::from_elem(8, 7.0);
        let tree =
            RegressionTree::fit(x.view(), y.view(), &all(8), &TreeParams::default(), &mut XorShift64::new(1));
        assert_eq!(tree.n_nodes(), 1);
        assert_abs_diff_eq!(tree.predict_row(x.row(0)), 7.0);
    }

    #[test]
    fn constant_features_yield_single_leaf() {
        let x = Array2::from_elem((4, 2), 1.0);
        let y = array![1.0, 2.0, 3.0, 4.0];
        let tree =
            RegressionTree::fit(x.view(), y.view(), &all(4), &TreeParams::default(), &mut XorShift64::new(1));
        assert_eq!(tree.n_nodes(), 1);
        assert_abs_diff_eq!(tree.predict_row(x.row(0)), 2.5);
    }

    #[test]
    fn max_depth_is_respected() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(32, |i| (i * i) as f64);
        let params = TreeParams { max_depth: Some(3), max_features: 1, ..TreeParams::default() };
        let tree = RegressionTree::fit(x.view(), y.view(), &all(32), &params, &mut XorShift64::new(1));
        assert!(tree.depth() <= 3);
        assert!(tree.n_leaves() <= 8);
    }

    #[test]
    fn min_samples_leaf_is_respected() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| i as f64);
        let params = TreeParams { min_samples_leaf: 4, max_features: 1, ..TreeParams::default() };
        let tree = RegressionTree::fit(x.view(), y.view(), &all(20), &params, &mut XorShift64::new(1));
        for node in tree.nodes() {
            if let TreeNode::Leaf { samples, .. } = node {
                assert!(*samples >= 4, "leaf with {samples} samples");
            }
        }
    }

    #[test]
    fn unlimited_tree_interpolates_training_points() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(10, |i| (i as f64).sin() * 10.0);
        let tree =
            RegressionTree::fit(x.view(), y.view(), &all(10), &TreeParams::default(), &mut XorShift64::new(1));
        for i in 0..10 {
            assert_abs_diff_eq!(tree.predict_row(x.row(i)), y[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn repeated_samples_weight_the_leaf_mean() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = array![0.0, 3.0, 9.0];
        let tree = RegressionTree::fit(
            x.view(),
            y.view(),
            &[0, 1, 2, 2],
            &TreeParams::default(),
            &mut XorShift64::new(1),
        );
        assert_abs_diff_eq!(tree.predict_row(array![0.0].view()), 21.0 / 4.0);
    }
}

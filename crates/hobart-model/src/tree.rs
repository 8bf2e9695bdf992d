//! Regression trees used as the weak learner inside the boosted ensemble.
//!
//! Splits minimize the summed squared error of the two children, found by
//! a single sorted sweep per candidate feature with running prefix sums.
//! Thresholds are midpoints between adjacent distinct values.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;

/// Growth limits for a single tree.
#[derive(Debug, Clone)]
pub(crate) struct TreeConfig {
    /// Maximum tree depth; depth 1 is a stump.
    pub max_depth: usize,
    /// Minimum rows a node needs before a split is considered.
    pub min_samples_split: usize,
    /// Minimum rows each child must keep.
    pub min_samples_leaf: usize,
    /// Minimum squared-error reduction for a split to be accepted.
    pub min_gain: f64,
    /// Number of features drawn per split; `None` uses all of them.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone)]
pub(crate) struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Fit a tree on the rows listed in `rows`, predicting `target`.
    ///
    /// The feature matrix must be finite; impute before fitting.
    pub(crate) fn fit(
        features: &Array2<f64>,
        target: &Array1<f64>,
        rows: &[usize],
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Self {
        let root = build_node(features, target, rows, 0, config, rng);
        Self { root }
    }

    /// Predict a single row.
    pub(crate) fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn build_node(
    features: &Array2<f64>,
    target: &Array1<f64>,
    rows: &[usize],
    depth: usize,
    config: &TreeConfig,
    rng: &mut StdRng,
) -> Node {
    let count = rows.len();
    let sum: f64 = rows.iter().map(|&i| target[i]).sum();
    let mean = sum / count as f64;

    if depth >= config.max_depth || count < config.min_samples_split {
        return Node::Leaf { value: mean };
    }

    let Some(split) = find_best_split(features, target, rows, config, rng) else {
        return Node::Leaf { value: mean };
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&i| features[[i, split.feature]] <= split.threshold);

    // The sweep guarantees both children respect min_samples_leaf.
    let left = build_node(features, target, &left_rows, depth + 1, config, rng);
    let right = build_node(features, target, &right_rows, depth + 1, config, rng);
    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn find_best_split(
    features: &Array2<f64>,
    target: &Array1<f64>,
    rows: &[usize],
    config: &TreeConfig,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let n_features = features.ncols();
    let candidates: Vec<usize> = match config.max_features {
        Some(k) if k < n_features => index::sample(rng, n_features, k).into_vec(),
        _ => (0..n_features).collect(),
    };

    let total_n = rows.len() as f64;
    let total_sum: f64 = rows.iter().map(|&i| target[i]).sum();
    let total_sq: f64 = rows.iter().map(|&i| target[i] * target[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / total_n;

    let mut best: Option<SplitCandidate> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(rows.len());

    for &feature in &candidates {
        pairs.clear();
        pairs.extend(rows.iter().map(|&i| (features[[i, feature]], target[i])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_n = 0.0;
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..pairs.len() - 1 {
            let (value, y) = pairs[i];
            left_n += 1.0;
            left_sum += y;
            left_sq += y * y;

            let next_value = pairs[i + 1].0;
            if value >= next_value {
                continue;
            }
            let right_n = total_n - left_n;
            if (left_n as usize) < config.min_samples_leaf
                || (right_n as usize) < config.min_samples_leaf
            {
                continue;
            }

            let left_sse = left_sq - left_sum * left_sum / left_n;
            let right_sum = total_sum - left_sum;
            let right_sse = (total_sq - left_sq) - right_sum * right_sum / right_n;
            let gain = parent_sse - left_sse - right_sse;
            if gain <= config.min_gain {
                continue;
            }
            if best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (value + next_value) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

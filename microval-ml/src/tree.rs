//! Binary decision tree classifier (CART-style).
//!
//! Splits minimize weighted Gini impurity or Shannon entropy, leaves store
//! the fraction of positive training samples that reached them, so the tree
//! produces a probability rather than a bare vote.
//!
//! Data is flat row-major `&[f64]` with an `n_features` parameter, consistent
//! with the rest of the microval-ml crate.

use std::str::FromStr;

use microval_core::{MicrovalError, Result};

use crate::rng::LcgRng;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Impurity measure used to rank candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SplitCriterion {
    #[default]
    Gini,
    Entropy,
}

impl SplitCriterion {
    /// Impurity of a node holding `pos` positives out of `n` samples.
    fn impurity(self, pos: usize, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let p = pos as f64 / n as f64;
        let q = 1.0 - p;
        match self {
            SplitCriterion::Gini => 1.0 - p * p - q * q,
            SplitCriterion::Entropy => {
                let h = |x: f64| if x > 0.0 { -x * x.log2() } else { 0.0 };
                h(p) + h(q)
            }
        }
    }
}

impl FromStr for SplitCriterion {
    type Err = MicrovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(SplitCriterion::Gini),
            "entropy" => Ok(SplitCriterion::Entropy),
            other => Err(MicrovalError::InvalidInput(format!(
                "unknown split criterion '{}', expected gini or entropy",
                other
            ))),
        }
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// Maximum depth; `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,
    /// Minimum number of samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Impurity measure.
    pub criterion: SplitCriterion,
    /// Features sampled per split; `None` considers all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            max_features: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tree node representation (arena-allocated)
// ---------------------------------------------------------------------------

/// A single node in the decision tree.
#[derive(Debug, Clone)]
enum TreeNode {
    /// Internal split node.
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,  // index into arena
        right: usize, // index into arena
    },
    /// Terminal leaf node.
    Leaf {
        /// Fraction of positive training samples in this leaf.
        positive_fraction: f64,
    },
}

// ---------------------------------------------------------------------------
// DecisionTree
// ---------------------------------------------------------------------------

/// A binary decision tree classifier.
///
/// Nodes live in a flat arena with index 0 as the root.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Fit a decision tree on flat row-major data.
    ///
    /// * `data`: flat row-major `n_samples x n_features`
    /// * `n_features`: number of features per sample
    /// * `labels`: `true` for the positive class
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty or dimensions are inconsistent.
    pub fn fit(
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        params: &TreeParams,
    ) -> Result<Self> {
        let n_samples = check_dimensions(data, n_features, labels)?;
        let indices: Vec<usize> = (0..n_samples).collect();
        // Only consulted when max_features is set.
        let mut rng = LcgRng::new(0);
        Self::fit_indices(data, n_features, labels, &indices, params, &mut rng)
    }

    /// Fit on the rows named by `sample_indices` (duplicates allowed, as in a
    /// bootstrap sample). Used by [`RandomForest`](crate::forest::RandomForest).
    pub(crate) fn fit_indices(
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        sample_indices: &[usize],
        params: &TreeParams,
        rng: &mut LcgRng,
    ) -> Result<Self> {
        if sample_indices.is_empty() {
            return Err(MicrovalError::InvalidInput("empty sample set".into()));
        }
        let mut builder = TreeBuilder {
            data,
            n_features,
            labels,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.build(sample_indices, 0);
        Ok(Self {
            nodes: builder.nodes,
        })
    }

    /// Probability that `sample` belongs to the positive class.
    ///
    /// `sample` must have exactly `n_features` elements.
    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { positive_fraction } => return *positive_fraction,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature_idx] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

}

/// Validate flat data against its label vector; returns `n_samples`.
pub(crate) fn check_dimensions(data: &[f64], n_features: usize, labels: &[bool]) -> Result<usize> {
    if data.is_empty() {
        return Err(MicrovalError::InvalidInput("empty data".into()));
    }
    if n_features == 0 {
        return Err(MicrovalError::InvalidInput("n_features must be > 0".into()));
    }
    if data.len() % n_features != 0 {
        return Err(MicrovalError::InvalidInput(format!(
            "data length {} not divisible by n_features {}",
            data.len(),
            n_features
        )));
    }
    let n_samples = data.len() / n_features;
    if labels.len() != n_samples {
        return Err(MicrovalError::InvalidInput(format!(
            "labels length {} != n_samples {}",
            labels.len(),
            n_samples
        )));
    }
    Ok(n_samples)
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

struct TreeBuilder<'a> {
    data: &'a [f64],
    n_features: usize,
    labels: &'a [bool],
    params: &'a TreeParams,
    rng: &'a mut LcgRng,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    /// Recursively build the subtree for `indices`, returning its arena index.
    fn build(&mut self, indices: &[usize], depth: usize) -> usize {
        let pos = indices.iter().filter(|&&i| self.labels[i]).count();
        let n = indices.len();
        let leaf = TreeNode::Leaf {
            positive_fraction: pos as f64 / n as f64,
        };

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth_reached || n < 2 * min_leaf || pos == 0 || pos == n {
            self.nodes.push(leaf);
            return self.nodes.len() - 1;
        }

        let Some((feature, threshold)) = self.find_best_split(indices, pos) else {
            self.nodes.push(leaf);
            return self.nodes.len() - 1;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.value(i, feature) <= threshold);

        // Reserve a slot for this split node
        let node_idx = self.nodes.len();
        self.nodes.push(leaf);

        let left = self.build(&left_indices, depth + 1);
        let right = self.build(&right_indices, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature_idx: feature,
            threshold,
            left,
            right,
        };
        node_idx
    }

    #[inline]
    fn value(&self, sample: usize, feature: usize) -> f64 {
        self.data[sample * self.n_features + feature]
    }

    /// Best `(feature, threshold)` by impurity decrease, honoring
    /// `min_samples_leaf`. `None` when no split improves the node.
    fn find_best_split(&mut self, indices: &[usize], pos: usize) -> Option<(usize, f64)> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let criterion = self.params.criterion;
        let parent = criterion.impurity(pos, n);

        let candidates = self.candidate_features();

        let mut best: Option<(usize, f64)> = None;
        let mut best_gain = 0.0;
        let mut column: Vec<(f64, bool)> = Vec::with_capacity(n);

        for feat in candidates {
            column.clear();
            column.extend(indices.iter().map(|&i| (self.value(i, feat), self.labels[i])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Sweep split positions between distinct consecutive values
            let mut left_pos = 0usize;
            for split in 1..n {
                if column[split - 1].1 {
                    left_pos += 1;
                }
                if column[split - 1].0 == column[split].0 {
                    continue;
                }
                let n_left = split;
                let n_right = n - split;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let weighted = (n_left as f64 * criterion.impurity(left_pos, n_left)
                    + n_right as f64 * criterion.impurity(pos - left_pos, n_right))
                    / n as f64;
                let gain = parent - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feat, (column[split - 1].0 + column[split].0) / 2.0));
                }
            }
        }
        best
    }

    /// Features to try at the current node.
    fn candidate_features(&mut self) -> Vec<usize> {
        let count = self
            .params
            .max_features
            .unwrap_or(self.n_features)
            .clamp(1, self.n_features);
        random_feature_subset(self.rng, self.n_features, count)
    }
}

/// Select `count` distinct feature indices from `0..n_features` at random.
pub(crate) fn random_feature_subset(
    rng: &mut LcgRng,
    n_features: usize,
    count: usize,
) -> Vec<usize> {
    let count = count.min(n_features);
    if count == n_features {
        return (0..n_features).collect();
    }

    // Fisher-Yates partial shuffle
    let mut pool: Vec<usize> = (0..n_features).collect();
    for i in 0..count {
        let j = i + (rng.next_bounded((n_features - i) as u64) as usize);
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_linearly_separable() {
        let data = vec![
            0.0, 0.0,
            1.0, 0.0,
            2.0, 0.0,
            10.0, 0.0,
            11.0, 0.0,
            12.0, 0.0,
        ];
        let labels = vec![false, false, false, true, true, true];
        let tree = DecisionTree::fit(&data, 2, &labels, &TreeParams::default()).unwrap();

        for i in 0..6 {
            let row = &data[i * 2..(i + 1) * 2];
            assert_eq!(tree.predict_proba(row) > 0.5, labels[i], "mismatch at sample {}", i);
        }
        assert_eq!(tree.predict_proba(&[0.5, 0.0]), 0.0);
        assert_eq!(tree.predict_proba(&[11.5, 0.0]), 1.0);
    }

    #[test]
    fn pure_node_stops() {
        let data = vec![0.0, 1.0, 2.0, 3.0];
        let labels = vec![true; 4];
        let tree = DecisionTree::fit(&data, 1, &labels, &TreeParams::default()).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.predict_proba(&[999.0]), 1.0);
    }

    #[test]
    fn max_depth_zero_is_root_leaf() {
        let data = vec![0.0, 1.0, 10.0, 11.0];
        let labels = vec![false, false, true, true];
        let params = TreeParams {
            max_depth: Some(0),
            ..Default::default()
        };
        let tree = DecisionTree::fit(&data, 1, &labels, &params).unwrap();
        assert_eq!(tree.nodes.len(), 1);
        assert!((tree.predict_proba(&[5.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn min_samples_leaf_blocks_small_splits() {
        // The only useful split isolates one sample
        let data = vec![0.0, 1.0, 2.0, 3.0];
        let labels = vec![true, false, false, false];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..Default::default()
        };
        let tree = DecisionTree::fit(&data, 1, &labels, &params).unwrap();
        // Split at 1.5 is still allowed (2 | 2), leaf fractions 0.5 and 0.0
        assert!((tree.predict_proba(&[0.0]) - 0.5).abs() < 1e-12);
        assert_eq!(tree.predict_proba(&[3.0]), 0.0);
    }

    #[test]
    fn entropy_criterion_separates() {
        let data = vec![0.0, 5.0, 0.1, 5.1, 0.2, 5.2];
        let labels = vec![false, true, false, true, false, true];
        let params = TreeParams {
            criterion: SplitCriterion::Entropy,
            ..Default::default()
        };
        let tree = DecisionTree::fit(&data, 1, &labels, &params).unwrap();
        assert_eq!(tree.predict_proba(&[0.05]), 0.0);
        assert_eq!(tree.predict_proba(&[5.05]), 1.0);
    }

    #[test]
    fn impurity_values() {
        assert!((SplitCriterion::Gini.impurity(2, 4) - 0.5).abs() < 1e-12);
        assert!((SplitCriterion::Entropy.impurity(2, 4) - 1.0).abs() < 1e-12);
        assert_eq!(SplitCriterion::Gini.impurity(4, 4), 0.0);
        assert_eq!(SplitCriterion::Entropy.impurity(0, 4), 0.0);
    }

    #[test]
    fn criterion_from_str() {
        assert_eq!("entropy".parse::<SplitCriterion>().unwrap(), SplitCriterion::Entropy);
        assert!("mse".parse::<SplitCriterion>().is_err());
    }

    #[test]
    fn empty_data_error() {
        assert!(DecisionTree::fit(&[], 2, &[], &TreeParams::default()).is_err());
    }

    #[test]
    fn dimension_mismatch_error() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(DecisionTree::fit(&data, 2, &[false], &TreeParams::default()).is_err());
    }

    #[test]
    fn labels_length_mismatch() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert!(DecisionTree::fit(&data, 2, &[true], &TreeParams::default()).is_err());
    }
}

//! Random forest scorer for held-out abundance profiles.
//!
//! A bagged ensemble of [`DecisionTree`](crate::tree::DecisionTree)s grown on
//! bootstrap samples with per-split feature sampling. The positive-class
//! score of a sample is the mean leaf probability across trees, which is what
//! the cross-validation engine ranks when it builds ROC curves.
//!
//! Profiles arrive as flat row-major `&[f64]` with an explicit `n_features`.

use microval_core::{MicrovalError, Predictor, Result};

use crate::rng::LcgRng;
use crate::tree::{check_dimensions, DecisionTree, SplitCriterion, TreeParams};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Forest size, tree growth limits and seed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RandomForestConfig {
    /// Trees grown per fit.
    pub n_trees: usize,
    /// Maximum depth per tree; `None` grows trees fully.
    pub max_depth: Option<usize>,
    /// Number of features to consider at each split. `None` defaults to
    /// `sqrt(n_features)`.
    pub max_features: Option<usize>,
    /// Minimum number of samples in each leaf.
    pub min_samples_leaf: usize,
    /// Split quality measure.
    pub criterion: SplitCriterion,
    /// Seed for bootstrap draws and feature sampling.
    pub seed: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            max_features: None,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// RandomForest
// ---------------------------------------------------------------------------

/// A fitted random forest (ensemble of binary decision trees).
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Grow `config.n_trees` trees, each on its own bootstrap resample.
    ///
    /// # Errors
    ///
    /// Returns [`MicrovalError::InvalidInput`] for empty or inconsistent data
    /// and for a forest of zero trees.
    pub fn fit(
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        config: &RandomForestConfig,
    ) -> Result<Self> {
        let n_samples = check_dimensions(data, n_features, labels)?;
        if config.n_trees == 0 {
            return Err(MicrovalError::InvalidInput("n_trees must be > 0".into()));
        }

        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            criterion: config.criterion,
            max_features: Some(
                config
                    .max_features
                    .unwrap_or_else(|| isqrt(n_features).max(1)),
            ),
        };

        let mut rng = LcgRng::new(config.seed);
        let mut trees = Vec::with_capacity(config.n_trees);
        for _ in 0..config.n_trees {
            // Resample with replacement, same size as the training set
            let sample_indices: Vec<usize> = (0..n_samples)
                .map(|_| rng.next_bounded(n_samples as u64) as usize)
                .collect();
            let mut tree_rng = LcgRng::new(rng.next_u64());
            trees.push(DecisionTree::fit_indices(
                data,
                n_features,
                labels,
                &sample_indices,
                &params,
                &mut tree_rng,
            )?);
        }

        Ok(Self { trees, n_features })
    }

    /// Mean positive-class probability across trees for one sample.
    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_proba(sample)).sum();
        total / self.trees.len() as f64
    }

    /// Positive-class probabilities for multiple samples.
    ///
    /// `data` is flat row-major with `n_features` columns.
    pub fn predict_proba_batch(&self, data: &[f64]) -> Vec<f64> {
        data.chunks_exact(self.n_features)
            .map(|row| self.predict_proba(row))
            .collect()
    }

    /// Number of trees in the forest.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of features seen during fitting.
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

// ---------------------------------------------------------------------------
// Predictor adapter
// ---------------------------------------------------------------------------

/// Untrained random forest that plugs into the cross-validation engine.
#[derive(Debug, Clone, Default)]
pub struct ForestPredictor {
    config: RandomForestConfig,
    model: Option<RandomForest>,
}

impl ForestPredictor {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// The fitted forest, if `fit` has been called.
    pub fn model(&self) -> Option<&RandomForest> {
        self.model.as_ref()
    }
}

impl Predictor for ForestPredictor {
    fn fit(&mut self, data: &[f64], n_features: usize, labels: &[bool]) -> Result<()> {
        self.model = Some(RandomForest::fit(data, n_features, labels, &self.config)?);
        Ok(())
    }

    fn reseed(&mut self, seed: u64) {
        self.config.seed = seed;
    }

    fn predict_scores(&self, data: &[f64], n_features: usize) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| MicrovalError::Predictor("forest scored before fit".into()))?;
        if n_features != model.n_features() {
            return Err(MicrovalError::Predictor(format!(
                "forest trained on {} features, asked to score {}",
                model.n_features(),
                n_features
            )));
        }
        Ok(model.predict_proba_batch(data))
    }
}

fn isqrt(n: usize) -> usize {
    (n as f64).sqrt() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two noisy groups on 4 features; feature 0 carries the signal.
    fn two_group_data() -> (Vec<f64>, Vec<bool>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            let offset = i as f64 * 0.1;
            data.extend_from_slice(&[1.0 + offset, 0.5, 0.2 + offset, 0.3]);
            labels.push(false);
        }
        for i in 0..15 {
            let offset = i as f64 * 0.1;
            data.extend_from_slice(&[6.0 + offset, 0.5, 0.3 + offset, 0.3]);
            labels.push(true);
        }
        (data, labels)
    }

    #[test]
    fn fit_and_predict_separable() {
        let (data, labels) = two_group_data();
        let config = RandomForestConfig {
            n_trees: 25,
            seed: 42,
            ..Default::default()
        };
        let forest = RandomForest::fit(&data, 4, &labels, &config).unwrap();

        let correct = data
            .chunks_exact(4)
            .zip(&labels)
            .filter(|(row, &l)| (forest.predict_proba(row) > 0.5) == l)
            .count();
        let accuracy = correct as f64 / labels.len() as f64;
        assert!(accuracy > 0.9, "accuracy {:.2} too low on training data", accuracy);
    }

    #[test]
    fn probabilities_in_unit_interval() {
        let (data, labels) = two_group_data();
        let forest = RandomForest::fit(&data, 4, &labels, &RandomForestConfig::default()).unwrap();
        for p in forest.predict_proba_batch(&data) {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn same_seed_same_scores() {
        let (data, labels) = two_group_data();
        let config = RandomForestConfig {
            n_trees: 10,
            criterion: SplitCriterion::Entropy,
            seed: 7,
            ..Default::default()
        };
        let f1 = RandomForest::fit(&data, 4, &labels, &config).unwrap();
        let f2 = RandomForest::fit(&data, 4, &labels, &config).unwrap();
        assert_eq!(f1.predict_proba_batch(&data), f2.predict_proba_batch(&data));
        assert_eq!(f1.n_trees(), 10);
    }

    #[test]
    fn reseed_replaces_forest_seed() {
        let (data, labels) = two_group_data();
        let mut p = ForestPredictor::new(RandomForestConfig {
            n_trees: 5,
            seed: 1,
            ..Default::default()
        });
        p.reseed(99);
        assert_eq!(p.config.seed, 99);
        p.fit(&data, 4, &labels).unwrap();

        let direct = RandomForest::fit(&data, 4, &labels, &p.config).unwrap();
        assert_eq!(
            p.predict_scores(&data, 4).unwrap(),
            direct.predict_proba_batch(&data)
        );
    }

    #[test]
    fn empty_forest_rejected() {
        let config = RandomForestConfig {
            n_trees: 0,
            ..Default::default()
        };
        assert!(RandomForest::fit(&[1.0, 2.0], 2, &[true], &config).is_err());
    }

    #[test]
    fn empty_training_set_rejected() {
        assert!(RandomForest::fit(&[], 2, &[], &RandomForestConfig::default()).is_err());
    }

    #[test]
    fn predictor_requires_fit() {
        let p = ForestPredictor::default();
        assert!(matches!(
            p.predict_scores(&[1.0, 2.0], 2),
            Err(MicrovalError::Predictor(_))
        ));
    }

    #[test]
    fn predictor_scores_rank_positives_higher() {
        let (data, labels) = two_group_data();
        let mut p = ForestPredictor::new(RandomForestConfig {
            n_trees: 30,
            ..Default::default()
        });
        p.fit(&data, 4, &labels).unwrap();
        let scores = p.predict_scores(&[1.2, 0.5, 0.4, 0.3, 6.5, 0.5, 0.7, 0.3], 4).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
        assert!(p.predict_scores(&[1.0, 2.0], 2).is_err());
        assert!(p.model().is_some());
    }
}

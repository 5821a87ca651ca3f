//! Core trait definitions for the Microval workspace.
//!
//! These traits define the contracts that the evaluation engine relies on
//! without knowing the concrete types behind them.

/// A trainable binary classifier, treated as a black box.
///
/// Feature data is flat row-major `&[f64]` with an explicit `n_features`,
/// the layout used across `microval-ml`. Labels are `true` for the positive
/// class.
pub trait Predictor {
    /// Train on `n_samples x n_features` data.
    fn fit(&mut self, data: &[f64], n_features: usize, labels: &[bool]) -> crate::Result<()>;

    /// Replace the seed of any internal randomness before the next `fit`.
    ///
    /// The cross-validation engine calls this once per fold with a seed
    /// derived from the run seed and the fold's position, so folds train
    /// independent models. Deterministic predictors keep the default no-op.
    fn reseed(&mut self, _seed: u64) {}

    /// Score each sample; higher means more likely positive.
    ///
    /// Returns one score per row of `data`.
    fn predict_scores(&self, data: &[f64], n_features: usize) -> crate::Result<Vec<f64>>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn fit(&mut self, data: &[f64], n_features: usize, labels: &[bool]) -> crate::Result<()> {
        (**self).fit(data, n_features, labels)
    }

    fn reseed(&mut self, seed: u64) {
        (**self).reseed(seed)
    }

    fn predict_scores(&self, data: &[f64], n_features: usize) -> crate::Result<Vec<f64>> {
        (**self).predict_scores(data, n_features)
    }
}

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}

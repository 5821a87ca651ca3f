//! Repeated stratified cross-validation.
//!
//! A run re-shuffles and re-splits the samples once per trial, then trains a
//! fresh predictor on every fold's training partition and scores its held-out
//! partition. All partitions are drawn before the first fit, so a fold count
//! the data cannot support fails before any model work starts.
//!
//! Folds are independent; with the `parallel` feature they are evaluated on a
//! rayon pool bounded by [`TrialConfig::n_jobs`]. Results come back in
//! `(trial, fold)` order either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use microval_core::{MicrovalError, Predictor, Result};
use tracing::{debug, info, warn};

use crate::cross_validation::{check_fold_count, FoldPartition, StratifiedKFold};
use crate::curve::{aggregate, AggregateCurve, DEFAULT_GRID_SIZE};
use crate::dataset::Dataset;
use crate::metrics::roc_curve;
use crate::rng::{entropy_seed, fold_seed};
use crate::tree::check_dimensions;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Evaluation of one fold of one trial.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FoldResult {
    /// Trial number (0-indexed).
    pub trial: usize,
    /// Fold number within the trial (0-indexed).
    pub fold: usize,
    /// Number of training samples.
    pub n_train: usize,
    /// Number of held-out samples.
    pub n_test: usize,
    /// False positive rates of the fold's ROC curve.
    pub fpr: Vec<f64>,
    /// True positive rates of the fold's ROC curve.
    pub tpr: Vec<f64>,
    /// Trapezoidal area under the fold's ROC curve.
    pub auc: f64,
}

/// A fold skipped because its held-out partition lacks one class.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DegenerateFold {
    pub trial: usize,
    pub fold: usize,
    /// Positives in the held-out partition.
    pub n_positive: usize,
    /// Negatives in the held-out partition.
    pub n_negative: usize,
}

/// Everything a cross-validation run produced.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CvReport {
    /// Valid folds, in `(trial, fold)` order.
    pub results: Vec<FoldResult>,
    /// Folds excluded from aggregation.
    pub skipped: Vec<DegenerateFold>,
    /// Whether the run stopped early on a cancellation request.
    pub cancelled: bool,
}

impl CvReport {
    /// Aggregate the valid folds onto a `grid_size`-point grid.
    ///
    /// # Errors
    ///
    /// Returns [`MicrovalError::NoValidFolds`] if no fold was evaluated.
    pub fn aggregate(&self, grid_size: usize) -> Result<AggregateCurve> {
        aggregate(&self.results, grid_size)
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative stop signal, checked before each fold evaluation.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running evaluations to stop after their current fold.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for repeated cross-validation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialConfig {
    /// Folds per trial.
    pub n_folds: usize,
    /// Independent re-split repetitions.
    pub n_trials: usize,
    /// Points on the aggregate false-positive-rate grid.
    pub grid_size: usize,
    /// Seed for the fold shuffles; `None` draws one from the clock.
    pub seed: Option<u64>,
    /// Worker threads for fold evaluation; 0 lets rayon decide.
    pub n_jobs: usize,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            n_folds: 10,
            n_trials: 1,
            grid_size: DEFAULT_GRID_SIZE,
            seed: None,
            n_jobs: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// TrialRunner
// ---------------------------------------------------------------------------

/// One unit of work: a single fold of a single trial.
struct FoldTask<'a> {
    trial: usize,
    fold: usize,
    partition: &'a FoldPartition,
}

enum FoldOutcome {
    Evaluated(FoldResult),
    Degenerate(DegenerateFold),
    Cancelled,
}

/// Runs repeated stratified cross-validation for a black-box predictor.
#[derive(Debug, Clone, Default)]
pub struct TrialRunner {
    config: TrialConfig,
    cancel: Option<CancelToken>,
}

impl TrialRunner {
    pub fn new(config: TrialConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// Cross-validate on a prepared dataset.
    ///
    /// See [`TrialRunner::run_flat`].
    pub fn run<P, F>(&self, dataset: &Dataset, factory: F) -> Result<CvReport>
    where
        P: Predictor,
        F: Fn() -> P + Sync,
    {
        self.run_flat(&dataset.data, dataset.n_features, &dataset.labels, factory)
    }

    /// Cross-validate on flat row-major data.
    ///
    /// `factory` is called once per fold for a fresh, untrained predictor.
    ///
    /// # Errors
    ///
    /// - [`MicrovalError::InvalidInput`] for inconsistent dimensions or zero trials.
    /// - [`MicrovalError::InsufficientSamples`] if the fold count cannot be
    ///   stratified; raised before any predictor is created.
    /// - Any error returned by the predictor or by ROC computation.
    pub fn run_flat<P, F>(
        &self,
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        factory: F,
    ) -> Result<CvReport>
    where
        P: Predictor,
        F: Fn() -> P + Sync,
    {
        check_dimensions(data, n_features, labels)?;
        if self.config.n_trials == 0 {
            return Err(MicrovalError::InvalidInput("n_trials must be > 0".into()));
        }
        let (n_positive, n_negative) = check_fold_count(labels, self.config.n_folds)?;

        let seed = self.config.seed.unwrap_or_else(entropy_seed);
        let mut splitter = StratifiedKFold::new(self.config.n_folds, seed);
        let trials = (0..self.config.n_trials)
            .map(|_| splitter.split(labels))
            .collect::<Result<Vec<_>>>()?;

        info!(
            n_samples = labels.len(),
            n_positive,
            n_negative,
            n_features,
            n_folds = self.config.n_folds,
            n_trials = self.config.n_trials,
            seed,
            "starting repeated cross-validation"
        );

        let report = self.evaluate_seeded(data, n_features, labels, &trials, seed, factory)?;

        info!(
            evaluated = report.results.len(),
            skipped = report.skipped.len(),
            cancelled = report.cancelled,
            "cross-validation finished"
        );
        Ok(report)
    }

    /// Evaluate caller-supplied partitions, one `Vec` of folds per trial.
    ///
    /// Folds whose held-out partition lacks a class are skipped and reported
    /// in [`CvReport::skipped`]. Predictors are reseeded per fold from
    /// [`TrialConfig::seed`], or from the clock when it is unset.
    pub fn evaluate_partitions<P, F>(
        &self,
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        trials: &[Vec<FoldPartition>],
        factory: F,
    ) -> Result<CvReport>
    where
        P: Predictor,
        F: Fn() -> P + Sync,
    {
        let seed = self.config.seed.unwrap_or_else(entropy_seed);
        self.evaluate_seeded(data, n_features, labels, trials, seed, factory)
    }

    fn evaluate_seeded<P, F>(
        &self,
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        trials: &[Vec<FoldPartition>],
        seed: u64,
        factory: F,
    ) -> Result<CvReport>
    where
        P: Predictor,
        F: Fn() -> P + Sync,
    {
        check_dimensions(data, n_features, labels)?;
        let tasks: Vec<FoldTask<'_>> = trials
            .iter()
            .enumerate()
            .flat_map(|(trial, folds)| {
                folds.iter().enumerate().map(move |(fold, partition)| FoldTask {
                    trial,
                    fold,
                    partition,
                })
            })
            .collect();
        if let Some(&bad) = tasks
            .iter()
            .flat_map(|t| t.partition.train.iter().chain(&t.partition.test))
            .find(|&&i| i >= labels.len())
        {
            return Err(MicrovalError::InvalidInput(format!(
                "partition index {} out of range for {} samples",
                bad,
                labels.len()
            )));
        }

        let eval =
            |task: &FoldTask<'_>| self.evaluate_fold(task, data, n_features, labels, seed, &factory);

        #[cfg(feature = "parallel")]
        let outcomes = {
            use rayon::prelude::*;
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.n_jobs)
                .build()
                .map_err(|e| MicrovalError::Other(format!("thread pool: {}", e)))?;
            pool.install(|| tasks.par_iter().map(eval).collect::<Result<Vec<_>>>())?
        };
        #[cfg(not(feature = "parallel"))]
        let outcomes = tasks.iter().map(eval).collect::<Result<Vec<_>>>()?;

        let mut report = CvReport::default();
        for outcome in outcomes {
            match outcome {
                FoldOutcome::Evaluated(result) => report.results.push(result),
                FoldOutcome::Degenerate(skipped) => report.skipped.push(skipped),
                FoldOutcome::Cancelled => report.cancelled = true,
            }
        }
        if report.cancelled {
            warn!(
                completed = report.results.len(),
                total = tasks.len(),
                "cross-validation cancelled; keeping completed folds"
            );
        }
        Ok(report)
    }

    fn evaluate_fold<P, F>(
        &self,
        task: &FoldTask<'_>,
        data: &[f64],
        n_features: usize,
        labels: &[bool],
        seed: u64,
        factory: &F,
    ) -> Result<FoldOutcome>
    where
        P: Predictor,
        F: Fn() -> P,
    {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Ok(FoldOutcome::Cancelled);
        }

        let test = &task.partition.test;
        let train = &task.partition.train;
        let n_positive = test.iter().filter(|&&i| labels[i]).count();
        let n_negative = test.len() - n_positive;
        if n_positive == 0 || n_negative == 0 {
            warn!(
                trial = task.trial,
                fold = task.fold,
                n_positive,
                n_negative,
                "degenerate fold: held-out partition lacks a class, skipping"
            );
            return Ok(FoldOutcome::Degenerate(DegenerateFold {
                trial: task.trial,
                fold: task.fold,
                n_positive,
                n_negative,
            }));
        }

        let (train_data, train_labels) = gather(data, n_features, labels, train);
        let (test_data, test_labels) = gather(data, n_features, labels, test);

        let mut predictor = factory();
        predictor.reseed(fold_seed(seed, task.trial, task.fold));
        predictor.fit(&train_data, n_features, &train_labels)?;
        let scores = predictor.predict_scores(&test_data, n_features)?;
        if scores.len() != test.len() {
            return Err(MicrovalError::Predictor(format!(
                "{} scores for {} held-out samples",
                scores.len(),
                test.len()
            )));
        }

        let roc = roc_curve(&scores, &test_labels)?;
        debug!(trial = task.trial, fold = task.fold, auc = roc.auc, "fold evaluated");

        Ok(FoldOutcome::Evaluated(FoldResult {
            trial: task.trial,
            fold: task.fold,
            n_train: train.len(),
            n_test: test.len(),
            fpr: roc.fpr(),
            tpr: roc.tpr(),
            auc: roc.auc,
        }))
    }
}

/// Repeated stratified cross-validation with default settings apart from
/// the fold and trial counts. Returns only the valid fold results.
pub fn run_trials<P, F>(
    data: &[f64],
    n_features: usize,
    labels: &[bool],
    factory: F,
    n_folds: usize,
    n_trials: usize,
) -> Result<Vec<FoldResult>>
where
    P: Predictor,
    F: Fn() -> P + Sync,
{
    let runner = TrialRunner::new(TrialConfig {
        n_folds,
        n_trials,
        ..Default::default()
    });
    Ok(runner.run_flat(data, n_features, labels, factory)?.results)
}

/// Copy the rows at `indices` out of flat data.
fn gather(
    data: &[f64],
    n_features: usize,
    labels: &[bool],
    indices: &[usize],
) -> (Vec<f64>, Vec<bool>) {
    let rows = indices
        .iter()
        .flat_map(|&i| data[i * n_features..(i + 1) * n_features].iter().copied())
        .collect();
    let labels = indices.iter().map(|&i| labels[i]).collect();
    (rows, labels)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

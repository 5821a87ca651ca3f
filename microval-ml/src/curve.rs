//! Mean ROC curve aggregation.
//!
//! Every fold's ROC curve is resampled onto a shared, evenly spaced
//! false-positive-rate grid by piecewise-linear interpolation. The resampled
//! true-positive-rate vectors are then averaged point by point, and the raw
//! per-fold AUCs are summarized separately so each fold's own measurement is
//! what the AUC statistics describe.

use microval_core::{MicrovalError, Result, Summarizable};

use crate::metrics::trapezoidal_auc;
use crate::trial::FoldResult;

/// Default number of grid points on the false-positive-rate axis.
pub const DEFAULT_GRID_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Mean ROC curve with a ±1 standard deviation band and AUC statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregateCurve {
    /// Ascending grid over `[0, 1]`, endpoints included.
    pub fpr: Vec<f64>,
    /// Mean interpolated true positive rate at each grid point.
    pub mean_tpr: Vec<f64>,
    /// Population standard deviation of the interpolated TPR at each point.
    pub std_tpr: Vec<f64>,
    /// Mean of the raw per-fold AUCs.
    pub mean_auc: f64,
    /// Population standard deviation of the raw per-fold AUCs.
    pub std_auc: f64,
    /// Trapezoidal area under the mean curve itself.
    pub mean_curve_auc: f64,
    /// Number of fold curves aggregated.
    pub n_folds: usize,
}

impl AggregateCurve {
    /// Lower edge of the ±1 std band, clipped at 0.
    pub fn tpr_lower(&self) -> Vec<f64> {
        self.mean_tpr
            .iter()
            .zip(&self.std_tpr)
            .map(|(m, s)| (m - s).max(0.0))
            .collect()
    }

    /// Upper edge of the ±1 std band, clipped at 1.
    pub fn tpr_upper(&self) -> Vec<f64> {
        self.mean_tpr
            .iter()
            .zip(&self.std_tpr)
            .map(|(m, s)| (m + s).min(1.0))
            .collect()
    }

    /// `(fpr, mean_tpr, std_tpr)` triples along the grid.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.fpr
            .iter()
            .zip(&self.mean_tpr)
            .zip(&self.std_tpr)
            .map(|((&f, &m), &s)| (f, m, s))
    }
}

impl Summarizable for AggregateCurve {
    fn summary(&self) -> String {
        format!(
            "mean ROC AUC = {:.4} ± {:.4} over {} folds (AUC of mean curve = {:.4})",
            self.mean_auc, self.std_auc, self.n_folds, self.mean_curve_auc
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Accumulates fold curves and AUCs, then summarizes them.
#[derive(Debug, Clone)]
pub struct CurveAggregator {
    grid: Vec<f64>,
    tprs: Vec<Vec<f64>>,
    aucs: Vec<f64>,
}

impl CurveAggregator {
    /// Aggregator over a grid of `grid_size` points spanning `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `grid_size < 2`.
    pub fn new(grid_size: usize) -> Result<Self> {
        if grid_size < 2 {
            return Err(MicrovalError::InvalidInput(format!(
                "grid size must be at least 2, got {}",
                grid_size
            )));
        }
        Ok(Self {
            grid: linspace(0.0, 1.0, grid_size),
            tprs: Vec::new(),
            aucs: Vec::new(),
        })
    }

    /// Resample one fold's curve onto the grid and record its AUC.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve is empty or `fpr` and `tpr` differ in length.
    pub fn push_curve(&mut self, fpr: &[f64], tpr: &[f64], auc: f64) -> Result<()> {
        if fpr.is_empty() || fpr.len() != tpr.len() {
            return Err(MicrovalError::InvalidInput(format!(
                "ROC curve with {} fpr and {} tpr values",
                fpr.len(),
                tpr.len()
            )));
        }
        let mut resampled: Vec<f64> = self.grid.iter().map(|&x| interp(x, fpr, tpr)).collect();
        // Vertical segments at the origin would otherwise lift the first point
        resampled[0] = 0.0;
        self.tprs.push(resampled);
        self.aucs.push(auc);
        Ok(())
    }

    /// Add a fold result.
    pub fn push(&mut self, result: &FoldResult) -> Result<()> {
        self.push_curve(&result.fpr, &result.tpr, result.auc)
    }

    /// Number of curves accumulated so far.
    pub fn len(&self) -> usize {
        self.aucs.len()
    }

    /// Whether no curve has been added.
    pub fn is_empty(&self) -> bool {
        self.aucs.is_empty()
    }

    /// Compute the mean curve and AUC statistics.
    ///
    /// # Errors
    ///
    /// Returns [`MicrovalError::NoValidFolds`] if nothing was accumulated.
    pub fn finish(&self) -> Result<AggregateCurve> {
        if self.is_empty() {
            return Err(MicrovalError::NoValidFolds);
        }

        let n_points = self.grid.len();
        let mut mean_tpr = Vec::with_capacity(n_points);
        let mut std_tpr = Vec::with_capacity(n_points);
        let mut column = Vec::with_capacity(self.tprs.len());
        for j in 0..n_points {
            column.clear();
            column.extend(self.tprs.iter().map(|t| t[j]));
            let (mean, std) = mean_std(&column);
            mean_tpr.push(mean);
            std_tpr.push(std);
        }
        if let Some(last) = mean_tpr.last_mut() {
            *last = 1.0;
        }

        let (mean_auc, std_auc) = mean_std(&self.aucs);
        let mean_curve_auc = trapezoidal_auc(&self.grid, &mean_tpr);

        Ok(AggregateCurve {
            fpr: self.grid.clone(),
            mean_tpr,
            std_tpr,
            mean_auc,
            std_auc,
            mean_curve_auc,
            n_folds: self.aucs.len(),
        })
    }
}

/// Aggregate a set of fold results onto a `grid_size`-point grid.
///
/// # Errors
///
/// Returns [`MicrovalError::NoValidFolds`] if `results` is empty, or an
/// invalid-input error for a bad grid size or malformed curve.
pub fn aggregate(results: &[FoldResult], grid_size: usize) -> Result<AggregateCurve> {
    let mut aggregator = CurveAggregator::new(grid_size)?;
    for result in results {
        aggregator.push(result)?;
    }
    aggregator.finish()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = stop;
            values
        }
    }
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be non-empty and non-decreasing, with `fp` of the same length;
/// [`CurveAggregator::push_curve`] checks both before calling. Outside its
/// range the end values are returned. Where several points share an x
/// coordinate, the last of them is the anchor for values at and to the right
/// of it.
pub(crate) fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len();
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // Last knot with xp[j] <= x; here j + 1 < n and xp[j + 1] > x
    let j = xp.partition_point(|&v| v <= x) - 1;
    let (x0, x1) = (xp[j], xp[j + 1]);
    let slope = (fp[j + 1] - fp[j]) / (x1 - x0);
    fp[j] + slope * (x - x0)
}

/// Population mean and standard deviation; a single value has std 0.
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

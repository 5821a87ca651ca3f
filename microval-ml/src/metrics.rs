//! ROC curves and trapezoidal AUC for binary scores.

use microval_core::{MicrovalError, Result};

/// A single point on the ROC curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RocPoint {
    /// Samples scoring at or above this value are called positive.
    pub threshold: f64,
    /// FP / (FP + TN).
    pub fpr: f64,
    /// TP / (TP + FN).
    pub tpr: f64,
}

/// ROC curve of one set of held-out scores.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RocCurve {
    /// Starts at `(0, 0)` with an infinite threshold, ends at `(1, 1)`.
    pub points: Vec<RocPoint>,
    pub auc: f64,
}

impl RocCurve {
    pub fn fpr(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.fpr).collect()
    }

    pub fn tpr(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.tpr).collect()
    }
}

/// Count both classes, rejecting input ROC analysis cannot use.
fn check_scores(scores: &[f64], labels: &[bool]) -> Result<(usize, usize)> {
    if scores.len() != labels.len() {
        return Err(MicrovalError::InvalidInput(format!(
            "{} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(MicrovalError::InvalidInput(format!("score {} is NaN", i)));
    }
    let n_positive = labels.iter().filter(|&&l| l).count();
    let n_negative = labels.len() - n_positive;
    if n_positive == 0 || n_negative == 0 {
        return Err(MicrovalError::InvalidInput(format!(
            "ROC needs both classes, got {} positive and {} negative",
            n_positive, n_negative
        )));
    }
    Ok((n_positive, n_negative))
}

/// ROC curve of `scores` against `labels`, higher scores meaning positive.
///
/// Each distinct score is one threshold, visited in descending order, so
/// tied samples move the curve together.
///
/// # Errors
///
/// Returns [`MicrovalError::InvalidInput`] for empty or mismatched input, a
/// NaN score, or labels lacking one class.
pub fn roc_curve(scores: &[f64], labels: &[bool]) -> Result<RocCurve> {
    let (n_positive, n_negative) = check_scores(scores, labels)?;

    let mut ranked: Vec<(f64, bool)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = Vec::with_capacity(ranked.len() + 1);
    points.push(RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    });
    let (mut tp, mut fp) = (0usize, 0usize);
    for group in ranked.chunk_by(|a, b| a.0 == b.0) {
        let hits = group.iter().filter(|(_, l)| *l).count();
        tp += hits;
        fp += group.len() - hits;
        points.push(RocPoint {
            threshold: group[0].0,
            fpr: fp as f64 / n_negative as f64,
            tpr: tp as f64 / n_positive as f64,
        });
    }

    let fpr: Vec<f64> = points.iter().map(|p| p.fpr).collect();
    let tpr: Vec<f64> = points.iter().map(|p| p.tpr).collect();
    let auc = trapezoidal_auc(&fpr, &tpr);
    Ok(RocCurve { points, auc })
}

/// Area under the ROC curve; see [`roc_curve`].
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Result<f64> {
    roc_curve(scores, labels).map(|roc| roc.auc)
}

/// Area under the polyline through `(x[i], y[i])` by the trapezoid rule.
pub fn trapezoidal_auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]).abs() * (ys[0] + ys[1]) * 0.5)
        .sum()
}

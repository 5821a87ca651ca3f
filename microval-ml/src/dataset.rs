//! Dataset preparation from a combined metadata + abundance table.
//!
//! Metadata rows are dropped from the feature matrix, one metadata row
//! supplies the binary label of each sample, and the remaining abundance
//! rows become the features. Samples become rows of the output matrix.
//!
//! Feature data is flat row-major `n_samples x n_features`, consistent with
//! the rest of the microval-ml crate.

use std::fmt;
use std::str::FromStr;

use microval_core::{MicrovalError, Result, Summarizable};

use crate::table::AbundanceTable;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Value transform applied to every abundance cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Transform {
    /// Values pass through unchanged.
    #[default]
    None,
    /// Percentages are rescaled to `[0, 1]`, then `asin(sqrt(x))`.
    ArcsinSqrt,
    /// Presence/absence: `x > 0` becomes 1, everything else 0.
    Binary,
}

impl Transform {
    /// Apply the transform to a single value.
    ///
    /// Returns `None` when the value is outside the transform's domain:
    /// NaN and infinities under every transform, and negative input to
    /// [`Transform::ArcsinSqrt`].
    pub fn apply(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        match self {
            Transform::None => Some(value),
            Transform::ArcsinSqrt => {
                if value < 0.0 {
                    return None;
                }
                let p = (value / 100.0).min(1.0);
                Some(p.sqrt().asin())
            }
            Transform::Binary => Some(if value > 0.0 { 1.0 } else { 0.0 }),
        }
    }
}

impl FromStr for Transform {
    type Err = MicrovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "none" | "None" => Ok(Transform::None),
            "arcsin_sqrt" => Ok(Transform::ArcsinSqrt),
            "binary" => Ok(Transform::Binary),
            other => Err(MicrovalError::InvalidInput(format!(
                "unknown transform '{}', expected none, arcsin_sqrt or binary",
                other
            ))),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transform::None => "none",
            Transform::ArcsinSqrt => "arcsin_sqrt",
            Transform::Binary => "binary",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which rows of the table are metadata and how to read the labels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatasetConfig {
    /// Zero-based row indices (header excluded) holding metadata.
    pub metadata_rows: Vec<usize>,
    /// The metadata row that supplies each sample's class.
    pub target_row: usize,
    /// Target-row value mapped to the positive class.
    pub positive_label: String,
    /// Target-row value mapped to the negative class.
    pub negative_label: String,
    /// Transform applied to abundance values.
    pub transform: Transform,
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Feature matrix plus aligned binary labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Flat row-major `n_samples x n_features`.
    pub data: Vec<f64>,
    /// Number of features per sample.
    pub n_features: usize,
    /// `true` for the positive class, one per sample.
    pub labels: Vec<bool>,
    /// Sample identifiers, aligned with rows of `data`.
    pub sample_names: Vec<String>,
    /// Identifiers of the abundance rows kept as features.
    pub feature_names: Vec<String>,
}

impl Dataset {
    /// Number of samples (rows).
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Feature values of one sample.
    pub fn sample(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.n_features..(idx + 1) * self.n_features]
    }

    /// `(positive, negative)` sample counts.
    pub fn class_counts(&self) -> (usize, usize) {
        let pos = self.labels.iter().filter(|&&l| l).count();
        (pos, self.labels.len() - pos)
    }
}

impl Summarizable for Dataset {
    fn summary(&self) -> String {
        let (pos, neg) = self.class_counts();
        format!(
            "{} samples ({} positive, {} negative) x {} features",
            self.n_samples(),
            pos,
            neg,
            self.n_features
        )
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build a labelled feature matrix from a combined table.
///
/// # Errors
///
/// - [`MicrovalError::InvalidInput`] for out-of-range row indices, a target
///   row that is not a metadata row, or identical class labels.
/// - [`MicrovalError::UnmappedLabel`] if a sample's target value matches
///   neither label.
/// - [`MicrovalError::Parse`] if an abundance cell is not a number.
/// - [`MicrovalError::InvalidTransformInput`] if a value is NaN or infinite,
///   or negative under `arcsin_sqrt`.
pub fn build_dataset(table: &AbundanceTable, config: &DatasetConfig) -> Result<Dataset> {
    let n_rows = table.n_rows();
    if let Some(&bad) = config.metadata_rows.iter().find(|&&r| r >= n_rows) {
        return Err(MicrovalError::InvalidInput(format!(
            "metadata row {} out of range (table has {} rows)",
            bad, n_rows
        )));
    }
    if !config.metadata_rows.contains(&config.target_row) {
        return Err(MicrovalError::InvalidInput(format!(
            "target row {} is not one of the metadata rows {:?}",
            config.target_row, config.metadata_rows
        )));
    }
    if config.positive_label == config.negative_label {
        return Err(MicrovalError::InvalidInput(format!(
            "positive and negative labels are both '{}'",
            config.positive_label
        )));
    }

    let labels = map_labels(table, config)?;

    let mut is_metadata = vec![false; n_rows];
    for &r in &config.metadata_rows {
        is_metadata[r] = true;
    }
    let feature_rows: Vec<(&str, &[String])> = table
        .rows()
        .enumerate()
        .filter(|(r, _)| !is_metadata[*r])
        .map(|(_, row)| row)
        .collect();
    let n_features = feature_rows.len();
    let sample_names = table.sample_names();

    // Samples are columns in the table and rows in the output.
    let mut data = vec![0.0; sample_names.len() * n_features];
    for (j, &(feature, cells)) in feature_rows.iter().enumerate() {
        for ((s, cell), sample) in cells.iter().enumerate().zip(sample_names) {
            let raw: f64 = cell.trim().parse().map_err(|_| {
                MicrovalError::Parse(format!(
                    "row '{}', sample '{}': '{}' is not a number",
                    feature, sample, cell
                ))
            })?;
            let value = config.transform.apply(raw).ok_or_else(|| {
                MicrovalError::InvalidTransformInput {
                    sample: sample.clone(),
                    feature: feature.to_string(),
                    value: raw,
                }
            })?;
            data[s * n_features + j] = value;
        }
    }

    Ok(Dataset {
        data,
        n_features,
        labels,
        sample_names: sample_names.to_vec(),
        feature_names: feature_rows.iter().map(|(id, _)| id.to_string()).collect(),
    })
}

/// Map each sample's target-row value to a class.
fn map_labels(table: &AbundanceTable, config: &DatasetConfig) -> Result<Vec<bool>> {
    let target = table.row(config.target_row).ok_or_else(|| {
        MicrovalError::InvalidInput(format!("target row {} out of range", config.target_row))
    })?;
    target
        .iter()
        .zip(table.sample_names())
        .map(|(cell, sample)| {
            let value = cell.trim();
            if value == config.positive_label {
                Ok(true)
            } else if value == config.negative_label {
                Ok(false)
            } else {
                Err(MicrovalError::UnmappedLabel {
                    sample: sample.clone(),
                    value: value.to_string(),
                })
            }
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn binary_is_idempotent(values in proptest::collection::vec(-100.0f64..100.0, 1..50)) {
            for v in values {
                let once = Transform::Binary.apply(v).unwrap();
                let twice = Transform::Binary.apply(once).unwrap();
                prop_assert_eq!(once, twice);
            }
        }

        #[test]
        fn arcsin_sqrt_in_range(v in 0.0f64..=100.0) {
            let t = Transform::ArcsinSqrt.apply(v).unwrap();
            prop_assert!(t >= 0.0 && t <= std::f64::consts::FRAC_PI_2 + 1e-12);
        }

        #[test]
        fn arcsin_sqrt_negative_rejected(v in -1000.0f64..-1e-9) {
            prop_assert!(Transform::ArcsinSqrt.apply(v).is_none());
        }
    }
}

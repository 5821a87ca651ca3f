//! Cross-validated ROC evaluation for the Microval workspace.
//!
//! Turns a combined metadata + abundance table into a labelled feature
//! matrix, estimates a classifier's discriminative power with repeated
//! stratified k-fold cross-validation, and summarizes it as a mean ROC curve
//! with a ±1 std band and per-fold AUCs.
//!
//! - **Table**: [`AbundanceTable`], identifier column plus one column per sample
//! - **Dataset**: [`build_dataset`], metadata exclusion, label mapping, transforms
//! - **Folds**: [`StratifiedKFold`], shuffled stratified partitions
//! - **Trials**: [`TrialRunner`], fit/score cycles over repeated splits
//! - **Curves**: [`CurveAggregator`], grid resampling and mean/std statistics
//! - **Models**: [`RandomForest`] as a ready-made [`Predictor`](microval_core::Predictor)

pub mod cross_validation;
pub mod curve;
pub mod dataset;
pub mod forest;
pub mod metrics;
mod rng;
pub mod table;
pub mod tree;
pub mod trial;

pub use cross_validation::{check_fold_count, FoldPartition, StratifiedKFold};
pub use curve::{aggregate, AggregateCurve, CurveAggregator, DEFAULT_GRID_SIZE};
pub use dataset::{build_dataset, Dataset, DatasetConfig, Transform};
pub use forest::{ForestPredictor, RandomForest, RandomForestConfig};
pub use metrics::{roc_auc, roc_curve, RocCurve, RocPoint};
pub use rng::entropy_seed;
pub use table::AbundanceTable;
pub use tree::{DecisionTree, SplitCriterion, TreeParams};
pub use trial::{run_trials, CancelToken, CvReport, DegenerateFold, FoldResult, TrialConfig, TrialRunner};

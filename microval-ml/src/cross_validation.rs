//! Stratified k-fold partitioning for binary labels.
//!
//! Each class's indices are shuffled independently, cut into `k` near-equal
//! contiguous groups, and fold `i` takes group `i` of every class as its test
//! set. A [`StratifiedKFold`] keeps its PRNG between calls, so calling
//! [`StratifiedKFold::split`] repeatedly yields a fresh partition each time
//! while the whole sequence stays reproducible from one seed.

use microval_core::{MicrovalError, Result};

use crate::rng::{entropy_seed, shuffle, LcgRng};

/// One train/test partition of `0..n_samples`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FoldPartition {
    /// Training indices, ascending.
    pub train: Vec<usize>,
    /// Held-out indices, ascending.
    pub test: Vec<usize>,
}

// ---------------------------------------------------------------------------
// Stratified K-Fold
// ---------------------------------------------------------------------------

/// Check that `n_folds` can be stratified over `labels`.
///
/// Returns `(n_positive, n_negative)` on success.
///
/// # Errors
///
/// Returns [`MicrovalError::InsufficientSamples`] unless
/// `2 <= n_folds <= min(n_positive, n_negative)`.
pub fn check_fold_count(labels: &[bool], n_folds: usize) -> Result<(usize, usize)> {
    let n_positive = labels.iter().filter(|&&l| l).count();
    let n_negative = labels.len() - n_positive;
    if n_folds < 2 || n_folds > n_positive.min(n_negative) {
        return Err(MicrovalError::InsufficientSamples {
            n_folds,
            n_positive,
            n_negative,
        });
    }
    Ok((n_positive, n_negative))
}

/// Stratified k-fold splitter for binary labels.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_folds: usize,
    shuffle: bool,
    rng: LcgRng,
}

impl StratifiedKFold {
    /// Shuffling splitter whose partition sequence is fixed by `seed`.
    pub fn new(n_folds: usize, seed: u64) -> Self {
        Self {
            n_folds,
            shuffle: true,
            rng: LcgRng::new(seed),
        }
    }

    /// Shuffling splitter seeded from the clock.
    pub fn from_entropy(n_folds: usize) -> Self {
        Self::new(n_folds, entropy_seed())
    }

    /// Enable or disable shuffling within each class.
    ///
    /// Without shuffling every call returns the same partition, with groups
    /// taken in index order.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Number of folds produced per split.
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Partition `0..labels.len()` into `n_folds` stratified folds.
    ///
    /// # Errors
    ///
    /// Returns [`MicrovalError::InsufficientSamples`] if `n_folds < 2` or
    /// either class has fewer than `n_folds` samples.
    pub fn split(&mut self, labels: &[bool]) -> Result<Vec<FoldPartition>> {
        check_fold_count(labels, self.n_folds)?;
        let k = self.n_folds;

        let mut positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i]).collect();
        let mut negatives: Vec<usize> = (0..labels.len()).filter(|&i| !labels[i]).collect();
        if self.shuffle {
            shuffle(&mut self.rng, &mut positives);
            shuffle(&mut self.rng, &mut negatives);
        }

        let pos_groups = build_folds(&positives, k);
        let neg_groups = build_folds(&negatives, k);

        let n = labels.len();
        let mut partitions = Vec::with_capacity(k);
        for (pos, neg) in pos_groups.iter().zip(neg_groups.iter()) {
            let mut in_test = vec![false; n];
            for &i in pos.iter().chain(neg.iter()) {
                in_test[i] = true;
            }
            let test: Vec<usize> = (0..n).filter(|&i| in_test[i]).collect();
            let train: Vec<usize> = (0..n).filter(|&i| !in_test[i]).collect();
            partitions.push(FoldPartition { train, test });
        }
        Ok(partitions)
    }
}

/// Split a flat list of indices into `k` contiguous groups whose sizes
/// differ by at most one.
fn build_folds(indices: &[usize], k: usize) -> Vec<Vec<usize>> {
    let n = indices.len();
    let base_size = n / k;
    let remainder = n % k;

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for i in 0..k {
        let size = base_size + if i < remainder { 1 } else { 0 };
        folds.push(indices[start..start + size].to_vec());
        start += size;
    }
    folds
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced(n_pos: usize, n_neg: usize) -> Vec<bool> {
        let mut labels = vec![true; n_pos];
        labels.extend(std::iter::repeat(false).take(n_neg));
        labels
    }

    #[test]
    fn twenty_samples_five_folds() {
        let labels = balanced(10, 10);
        let folds = StratifiedKFold::new(5, 42).split(&labels).unwrap();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.test.len(), 4);
            assert_eq!(fold.train.len(), 16);
            let pos = fold.test.iter().filter(|&&i| labels[i]).count();
            assert_eq!(pos, 2);
        }
    }

    #[test]
    fn test_sets_cover_all_samples_once() {
        let labels = balanced(7, 13);
        let folds = StratifiedKFold::new(3, 7).split(&labels).unwrap();
        let mut all_test: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn uneven_class_sizes_near_equal() {
        // 7 positives over 3 folds -> 3, 2, 2
        let labels = balanced(7, 9);
        let folds = StratifiedKFold::new(3, 1).split(&labels).unwrap();
        let mut pos_sizes: Vec<usize> = folds
            .iter()
            .map(|f| f.test.iter().filter(|&&i| labels[i]).count())
            .collect();
        pos_sizes.sort_unstable();
        assert_eq!(pos_sizes, vec![2, 2, 3]);
    }

    #[test]
    fn deterministic_with_seed() {
        let labels = balanced(10, 12);
        let a = StratifiedKFold::new(4, 99).split(&labels).unwrap();
        let b = StratifiedKFold::new(4, 99).split(&labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_splits_differ() {
        let labels = balanced(15, 15);
        let mut splitter = StratifiedKFold::new(5, 3);
        let first = splitter.split(&labels).unwrap();
        let second = splitter.split(&labels).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn no_shuffle_is_ordered_and_stable() {
        let labels = balanced(4, 4);
        let mut splitter = StratifiedKFold::new(2, 0).with_shuffle(false);
        let a = splitter.split(&labels).unwrap();
        let b = splitter.split(&labels).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].test, vec![0, 1, 4, 5]);
        assert_eq!(a[1].test, vec![2, 3, 6, 7]);
    }

    #[test]
    fn too_many_folds_for_minority_class() {
        let labels = balanced(6, 30);
        match StratifiedKFold::new(10, 42).split(&labels) {
            Err(MicrovalError::InsufficientSamples {
                n_folds,
                n_positive,
                n_negative,
            }) => {
                assert_eq!((n_folds, n_positive, n_negative), (10, 6, 30));
            }
            other => panic!("expected InsufficientSamples, got {:?}", other),
        }
    }

    #[test]
    fn fewer_than_two_folds_rejected() {
        assert!(check_fold_count(&balanced(5, 5), 1).is_err());
        assert!(check_fold_count(&balanced(5, 5), 0).is_err());
        assert_eq!(check_fold_count(&balanced(5, 4), 4).unwrap(), (5, 4));
    }

    #[test]
    fn single_class_rejected() {
        assert!(check_fold_count(&balanced(10, 0), 2).is_err());
    }
}

//! Masked folding as two parallel folds: sums of filled data and counts of
//! valid samples. The engine itself never sees a mask.

use serde::Serialize;

use crate::array::{FoldResult, FoldedArray};
use crate::engine::{FoldOptions, fold};
use crate::wrap::{WrappedArray, trial_periods};

/// Summed and counted profiles for every trial period of one base period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldedProfiles {
    pub sums: FoldedArray,
    pub counts: FoldedArray,
    pub periods: Vec<f64>,
}

impl FoldedProfiles {
    /// Mean of the valid samples folded into `(row, col)`; `None` when none were.
    #[must_use]
    pub fn mean_at(&self, row: usize, col: usize) -> Option<f64> {
        let count = self.counts.get(row, col)?;
        if count <= 0.0 {
            return None;
        }
        self.sums.get(row, col).map(|sum| sum / count)
    }

    /// Row-major means, `None` wherever the count is zero.
    #[must_use]
    pub fn means(&self) -> Vec<Option<f64>> {
        self.sums
            .as_slice()
            .iter()
            .zip(self.counts.as_slice())
            .map(|(&sum, &count)| (count > 0.0).then(|| sum / count))
            .collect()
    }
}

/// Fold the filled data (invalid entries set to 0.0) and the validity counts.
pub fn fold_profiles(wrapped: &WrappedArray, options: &FoldOptions) -> FoldResult<FoldedProfiles> {
    let sums = fold(&wrapped.filled(0.0)?, options)?;
    let counts = fold(&wrapped.validity_counts()?, options)?;
    let periods = trial_periods(wrapped.base_period(), sums.rows());
    Ok(FoldedProfiles {
        sums,
        counts,
        periods,
    })
}

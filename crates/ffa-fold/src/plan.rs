use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;

use crate::array::{FoldError, FoldResult};

/// Row pairing and shift schedule for one butterfly stage.
///
/// Output row `k` of a group is `a_rows[k]` plus `b_rows[k]` rotated left by
/// `b_shifts[k]` columns. All three sequences have `group_size()` entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ButterflyPlan {
    pub stage: u32,
    pub a_rows: Vec<usize>,
    pub b_rows: Vec<usize>,
    pub b_shifts: Vec<usize>,
}

impl ButterflyPlan {
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.a_rows.len()
    }

    #[must_use]
    pub fn max_shift(&self) -> usize {
        self.b_shifts.iter().copied().max().unwrap_or(0)
    }

    /// Iterate `(a_row, b_row, b_shift)` triples in output-row order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.a_rows
            .iter()
            .zip(&self.b_rows)
            .zip(&self.b_shifts)
            .map(|((&a, &b), &shift)| (a, b, shift))
    }

    pub(crate) fn check_group(&self, group_rows: usize) -> FoldResult<()> {
        for len in [self.a_rows.len(), self.b_rows.len(), self.b_shifts.len()] {
            if len != group_rows {
                return Err(FoldError::ShapeMismatch {
                    context: "butterfly plan length",
                    expected: group_rows,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

/// Rows combined by one butterfly at `stage`, i.e. `2^stage`.
pub fn group_size(stage: u32) -> FoldResult<usize> {
    if stage == 0 {
        return Err(FoldError::InvalidStage {
            stage,
            detail: "stages are numbered from 1",
        });
    }
    1usize.checked_shl(stage).ok_or(FoldError::InvalidStage {
        stage,
        detail: "group size overflows usize",
    })
}

/// Butterfly schedule for `stage`.
///
/// Pairs occupy adjacent outputs `2j, 2j + 1`: both read row `j` of the first
/// half and row `half + j` of the second half. Shifts come from the ramp
/// `0, 1, ..., half`, each value doubled, with the first and last entry
/// dropped, so output `k` shifts by `(k + 1) / 2`.
pub fn plan(stage: u32) -> FoldResult<ButterflyPlan> {
    let size = group_size(stage)?;
    let half = size / 2;

    let a_rows = (0..half).flat_map(|j| [j, j]).collect::<Vec<_>>();
    let b_rows = (half..size).flat_map(|j| [j, j]).collect::<Vec<_>>();
    let b_shifts = (0..=half)
        .flat_map(|shift| [shift, shift])
        .skip(1)
        .take(size)
        .collect::<Vec<_>>();

    Ok(ButterflyPlan {
        stage,
        a_rows,
        b_rows,
        b_shifts,
    })
}

static SHARED_PLAN_CACHE: OnceLock<Mutex<HashMap<u32, Arc<ButterflyPlan>>>> = OnceLock::new();

fn shared_cache() -> &'static Mutex<HashMap<u32, Arc<ButterflyPlan>>> {
    SHARED_PLAN_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Memoised [`plan`]; the flag reports whether the plan came from the cache.
pub fn cached_plan(stage: u32) -> FoldResult<(Arc<ButterflyPlan>, bool)> {
    if let Some(hit) = shared_cache()
        .lock()
        .ok()
        .and_then(|cache| cache.get(&stage).cloned())
    {
        return Ok((hit, true));
    }

    let fresh = Arc::new(plan(stage)?);
    if let Ok(mut cache) = shared_cache().lock() {
        cache.insert(stage, Arc::clone(&fresh));
    }
    Ok((fresh, false))
}

#[must_use]
pub fn shared_plan_cache_len() -> usize {
    shared_cache().lock().map_or(0, |cache| cache.len())
}

pub fn clear_shared_plan_cache() {
    if let Ok(mut cache) = shared_cache().lock() {
        cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{cached_plan, group_size, plan, shared_plan_cache_len};
    use crate::array::FoldError;

    #[test]
    fn stage_one_pairs_adjacent_rows() {
        let p = plan(1).expect("stage 1");
        assert_eq!(p.a_rows, vec![0, 0]);
        assert_eq!(p.b_rows, vec![1, 1]);
        assert_eq!(p.b_shifts, vec![0, 1]);
        assert_eq!(p.max_shift(), 1);
    }

    #[test]
    fn stage_three_matches_doubled_ramp() {
        let p = plan(3).expect("stage 3");
        assert_eq!(p.group_size(), 8);
        assert_eq!(p.a_rows, vec![0, 0, 1, 1, 2, 2, 3, 3]);
        assert_eq!(p.b_rows, vec![4, 4, 5, 5, 6, 6, 7, 7]);
        assert_eq!(p.b_shifts, vec![0, 1, 1, 2, 2, 3, 3, 4]);
        assert_eq!(p.max_shift(), 4);
    }

    #[test]
    fn shifts_follow_half_ceiling_rule() {
        for stage in 1..=10 {
            let p = plan(stage).expect("plan");
            for (k, &shift) in p.b_shifts.iter().enumerate() {
                assert_eq!(shift, (k + 1) / 2, "stage {stage} output {k}");
            }
            assert_eq!(p.max_shift(), p.group_size() / 2);
        }
    }

    #[test]
    fn stage_zero_is_rejected() {
        let err = plan(0).expect_err("stage 0 must fail");
        assert!(matches!(err, FoldError::InvalidStage { stage: 0, .. }));
    }

    #[test]
    fn oversized_stage_is_rejected() {
        let err = group_size(usize::BITS).expect_err("overflowing stage must fail");
        assert!(matches!(err, FoldError::InvalidStage { .. }));
    }

    #[test]
    fn check_group_flags_length_disagreement() {
        let p = plan(2).expect("stage 2");
        assert!(p.check_group(4).is_ok());
        let err = p.check_group(8).expect_err("mismatched group");
        assert_eq!(
            err,
            FoldError::ShapeMismatch {
                context: "butterfly plan length",
                expected: 8,
                actual: 4,
            }
        );
    }

    #[test]
    fn cached_plan_matches_fresh_plan() {
        let (first, _) = cached_plan(5).expect("cached plan");
        let (second, _) = cached_plan(5).expect("cached plan");
        assert_eq!(*first, plan(5).expect("fresh plan"));
        assert_eq!(first, second);
        assert!(shared_plan_cache_len() >= 1);
    }
}

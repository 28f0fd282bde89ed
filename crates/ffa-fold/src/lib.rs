#![forbid(unsafe_code)]

//! Fast Folding Algorithm.
//!
//! A time series wrapped on a base period `P0` into `R = 2^K` rows is folded
//! at every trial period `P0 + k / (R - 1)` at once, in `K` butterfly stages
//! of pairwise shift-and-add (Staelin 1969).
//!
//! | Module     | Contents                                                  |
//! |------------|-----------------------------------------------------------|
//! | `array`    | [`FoldedArray`], [`Shape2D`], [`FoldError`]               |
//! | `wrap`     | [`wrap()`], [`wrap_masked`], [`ValidityMask`], [`trial_periods`] |
//! | `plan`     | [`plan()`], [`ButterflyPlan`] and the shared plan cache     |
//! | `engine`   | [`fold`], [`fold_stage`], [`FoldOptions`], [`FoldTrace`]  |
//! | `shuffle`  | [`remainder_shuffle`]                                     |
//! | `profiles` | [`fold_profiles`]: sums and counts folded side by side    |

pub mod array;
pub mod engine;
pub mod plan;
pub mod profiles;
pub mod shuffle;
pub mod wrap;

pub use array::{FoldError, FoldResult, FoldedArray, Shape2D};
pub use engine::{
    FoldOptions, FoldTrace, TRACE_CAPACITY, TraceBuffer, WorkerPolicy, fold, fold_stage,
    pending_fold_traces, stage_count, take_fold_traces,
};
pub use plan::{
    ButterflyPlan, cached_plan, clear_shared_plan_cache, group_size, plan, shared_plan_cache_len,
};
pub use profiles::{FoldedProfiles, fold_profiles};
pub use shuffle::{RemainderShuffle, remainder_shuffle};
pub use wrap::{ValidityMask, WrapOptions, WrappedArray, trial_periods, wrap, wrap_masked};

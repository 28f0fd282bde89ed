use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use ffa_runtime::{RuntimeMode, now_unix_ms};
use rayon::prelude::*;
use serde::Serialize;

use crate::array::{FoldError, FoldResult, FoldedArray, Shape2D};
use crate::plan::{ButterflyPlan, cached_plan, group_size};

/// Worker control policy for the groups inside one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerPolicy {
    /// Let rayon pick an execution width.
    #[default]
    Auto,
    /// Require an exact worker count.
    Exact(usize),
    /// Upper-bound worker count.
    Max(usize),
}

impl WorkerPolicy {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Auto => "auto".to_owned(),
            Self::Exact(n) => format!("exact:{n}"),
            Self::Max(n) => format!("max:{n}"),
        }
    }
}

/// Options shared by fold entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FoldOptions {
    pub mode: RuntimeMode,
    pub workers: WorkerPolicy,
    pub check_finite: bool,
}

impl FoldOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: WorkerPolicy) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }

    /// Options that never leave the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default().with_workers(WorkerPolicy::Exact(1))
    }
}

/// One record per completed [`fold`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoldTrace {
    pub operation_id: String,
    pub timestamp_ms: u64,
    pub rows: usize,
    pub cols: usize,
    pub stages: u32,
    pub workers: String,
    pub plan_cache_hits: usize,
    pub mode: RuntimeMode,
    pub timing_ns: u128,
}

impl FoldTrace {
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Most traces kept between drains; older ones are evicted first.
pub const TRACE_CAPACITY: usize = 1024;

/// Bounded FIFO of fold traces.
///
/// When full, the oldest trace is dropped before a new one is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceBuffer {
    capacity: usize,
    entries: VecDeque<FoldTrace>,
}

impl TraceBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, trace: FoldTrace) {
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(trace);
    }

    /// Remove and return every trace, oldest first.
    pub fn drain(&mut self) -> Vec<FoldTrace> {
        self.entries.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

static TRACE_LOG: OnceLock<Mutex<TraceBuffer>> = OnceLock::new();
static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn trace_log() -> &'static Mutex<TraceBuffer> {
    TRACE_LOG.get_or_init(|| Mutex::new(TraceBuffer::new(TRACE_CAPACITY)))
}

fn next_operation_id() -> String {
    let next = OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("ffa-op-{next:016x}")
}

fn record_trace(trace: FoldTrace) {
    if let Ok(mut log) = trace_log().lock() {
        log.record(trace);
    }
}

/// Drain every trace recorded since the last drain, at most [`TRACE_CAPACITY`].
#[must_use]
pub fn take_fold_traces() -> Vec<FoldTrace> {
    trace_log()
        .lock()
        .map(|mut log| log.drain())
        .unwrap_or_default()
}

/// Traces currently held, without draining them.
#[must_use]
pub fn pending_fold_traces() -> usize {
    trace_log().lock().map(|log| log.len()).unwrap_or(0)
}

/// Number of butterfly stages needed for `shape`, i.e. `log2(rows)`.
pub fn stage_count(shape: Shape2D) -> FoldResult<u32> {
    shape.validate()?;
    if !shape.rows.is_power_of_two() {
        return Err(shape.invalid("row count must be a power of two"));
    }
    Ok(shape.rows.trailing_zeros())
}

/// Fold a wrapped array through every butterfly stage.
///
/// Row `k` of the result is the profile summed along trial period
/// `P0 + k / (rows - 1)`. The input is never modified; stages ping-pong
/// between two owned buffers and run strictly in increasing order.
pub fn fold(array: &FoldedArray, options: &FoldOptions) -> FoldResult<FoldedArray> {
    validate_workers(options.workers)?;
    let stages = stage_count(array.shape())?;
    validate_finite(array, options)?;

    let mut plans = Vec::with_capacity(stages as usize);
    let mut plan_cache_hits = 0usize;
    for stage in 1..=stages {
        let (plan, hit) = cached_plan(stage)?;
        plan.check_group(group_size(stage)?)?;
        plan_cache_hits += usize::from(hit);
        plans.push(plan);
    }

    let lanes = resolve_lanes(options.workers);
    let started = Instant::now();
    let mut current = array.clone();
    if !plans.is_empty() {
        let mut next = FoldedArray::zeros(array.shape())?;
        for plan in &plans {
            shift_add_stage(current.as_slice(), next.as_mut_slice(), array.cols(), plan, lanes);
            std::mem::swap(&mut current, &mut next);
        }
    }

    record_trace(FoldTrace {
        operation_id: next_operation_id(),
        timestamp_ms: now_unix_ms(),
        rows: array.rows(),
        cols: array.cols(),
        stages,
        workers: options.workers.label(),
        plan_cache_hits,
        mode: options.mode,
        timing_ns: started.elapsed().as_nanos(),
    });

    Ok(current)
}

/// Run a single butterfly stage over every contiguous group of `2^stage` rows.
///
/// Only meaningful as part of the full recursion: stage `k` assumes each
/// input row already holds a stage `k - 1` partial fold.
pub fn fold_stage(array: &FoldedArray, stage: u32) -> FoldResult<FoldedArray> {
    let group_rows = group_size(stage)?;
    if !array.rows().is_multiple_of(group_rows) {
        return Err(array
            .shape()
            .invalid("row count is not a multiple of the stage group size"));
    }
    let (plan, _) = cached_plan(stage)?;
    plan.check_group(group_rows)?;

    let mut out = FoldedArray::zeros(array.shape())?;
    shift_add_stage(array.as_slice(), out.as_mut_slice(), array.cols(), &plan, 1);
    Ok(out)
}

fn shift_add_stage(
    src: &[f64],
    dst: &mut [f64],
    cols: usize,
    plan: &Arc<ButterflyPlan>,
    lanes: usize,
) {
    let group_rows = plan.group_size();
    let block = group_rows * cols;
    let width = cols + plan.max_shift();
    let groups = src.len() / block;

    if lanes <= 1 || groups <= 1 {
        let mut extended = Vec::with_capacity(group_rows * width);
        for (src_group, dst_group) in src.chunks_exact(block).zip(dst.chunks_exact_mut(block)) {
            group_shift_add(src_group, dst_group, cols, plan, &mut extended);
        }
        return;
    }

    dst.par_chunks_exact_mut(block)
        .zip(src.par_chunks_exact(block))
        .with_min_len(groups.div_ceil(lanes))
        .for_each_init(
            || Vec::with_capacity(group_rows * width),
            |extended, (dst_group, src_group)| {
                group_shift_add(src_group, dst_group, cols, plan, extended);
            },
        );
}

/// Shift-and-add one group.
///
/// Every source row is first extended to `cols + max_shift` columns by
/// re-appending its own leading columns, so the rotated B operand is a plain
/// contiguous window starting at its shift.
fn group_shift_add(
    src: &[f64],
    dst: &mut [f64],
    cols: usize,
    plan: &ButterflyPlan,
    extended: &mut Vec<f64>,
) {
    let width = cols + plan.max_shift();
    extended.clear();
    for row in src.chunks_exact(cols) {
        extended.extend(row.iter().cycle().take(width).copied());
    }

    for (out, (a, b, shift)) in dst.chunks_exact_mut(cols).zip(plan.pairs()) {
        let a_start = a * width;
        let b_start = b * width + shift;
        let a_row = &extended[a_start..a_start + cols];
        let b_window = &extended[b_start..b_start + cols];
        for ((slot, &lhs), &rhs) in out.iter_mut().zip(a_row).zip(b_window) {
            *slot = lhs + rhs;
        }
    }
}

fn resolve_lanes(policy: WorkerPolicy) -> usize {
    let available = rayon::current_num_threads().max(1);
    match policy {
        WorkerPolicy::Auto => available,
        WorkerPolicy::Exact(n) => n,
        WorkerPolicy::Max(n) => n.min(available),
    }
}

fn validate_workers(policy: WorkerPolicy) -> FoldResult<()> {
    match policy {
        WorkerPolicy::Auto => Ok(()),
        WorkerPolicy::Exact(0) | WorkerPolicy::Max(0) => {
            Err(FoldError::InvalidWorkers { requested: 0 })
        }
        WorkerPolicy::Exact(_) | WorkerPolicy::Max(_) => Ok(()),
    }
}

fn validate_finite(array: &FoldedArray, options: &FoldOptions) -> FoldResult<()> {
    let should_check = options.check_finite || options.mode.checks_finite();
    if should_check && !array.all_finite() {
        return Err(FoldError::NonFiniteInput);
    }
    Ok(())
}

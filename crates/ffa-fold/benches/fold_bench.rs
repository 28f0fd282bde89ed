use criterion::{Criterion, criterion_group, criterion_main};
use ffa_fold::{FoldOptions, FoldedArray, WrapOptions, fold, fold_profiles, plan, wrap_masked};

/// Pulse train with a 1-in-17 dropout mask, the shape of a real light curve.
fn pulse_train(len: usize, period: f64) -> (Vec<f64>, Vec<bool>) {
    let series = (0..len)
        .map(|i| {
            let phase = (i as f64 / period).fract();
            if phase < 0.02 { 1.0 } else { 0.0 }
        })
        .collect();
    let valid = (0..len).map(|i| i % 17 != 0).collect();
    (series, valid)
}

fn bench_fold_identity(c: &mut Criterion) {
    let input = FoldedArray::eye(32, 2500).expect("eye");
    let sequential = FoldOptions::sequential();
    c.bench_function("fold_eye_32x2500_sequential", |b| {
        b.iter(|| fold(&input, &sequential).unwrap());
    });
    let parallel = FoldOptions::default();
    c.bench_function("fold_eye_32x2500_auto", |b| {
        b.iter(|| fold(&input, &parallel).unwrap());
    });
}

fn bench_fold_rows(c: &mut Criterion) {
    for &rows in &[64, 256, 1024] {
        let input = FoldedArray::eye(rows, 250).expect("eye");
        c.bench_function(&format!("fold_{rows}x250"), |b| {
            b.iter(|| fold(&input, &FoldOptions::default()).unwrap());
        });
    }
}

fn bench_plan(c: &mut Criterion) {
    c.bench_function("plan_stage_10", |b| {
        b.iter(|| plan(10).unwrap());
    });
}

fn bench_period_scan(c: &mut Criterion) {
    let (series, valid) = pulse_train(10_000, 731.4);
    let opts = WrapOptions::default().with_pad_to_pow2(true);
    c.bench_function("profiles_p0_250_to_260", |b| {
        b.iter(|| {
            for p0 in 250..260 {
                let wrapped = wrap_masked(&series, &valid, p0, &opts).unwrap();
                fold_profiles(&wrapped, &FoldOptions::default()).unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_fold_identity,
    bench_fold_rows,
    bench_plan,
    bench_period_scan
);
criterion_main!(benches);

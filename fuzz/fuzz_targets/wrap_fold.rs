#![no_main]

use arbitrary::Arbitrary;
use ffa_fold::{FoldOptions, WrapOptions, fold, fold_profiles, wrap_masked};
use ffa_runtime::RuntimeMode;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct WrapFoldInput {
    samples: Vec<i16>,
    dropouts: Vec<bool>,
    base_period: u8,
    fill_value: i8,
    pad_to_pow2: bool,
    hardened: bool,
}

fuzz_target!(|input: WrapFoldInput| {
    let sequence = input
        .samples
        .iter()
        .take(4096)
        .map(|&s| f64::from(s))
        .collect::<Vec<_>>();
    let valid = (0..sequence.len())
        .map(|i| !input.dropouts.get(i).copied().unwrap_or(false))
        .collect::<Vec<_>>();
    let options = WrapOptions::default()
        .with_fill_value(f64::from(input.fill_value))
        .with_pad_to_pow2(input.pad_to_pow2);
    let mode = if input.hardened {
        RuntimeMode::Hardened
    } else {
        RuntimeMode::Strict
    };

    let Ok(wrapped) = wrap_masked(&sequence, &valid, usize::from(input.base_period), &options)
    else {
        return;
    };
    let fold_options = FoldOptions::default().with_mode(mode);
    let Ok(folded) = fold(wrapped.data(), &fold_options) else {
        assert!(!wrapped.shape().rows.is_power_of_two());
        return;
    };
    assert_eq!(folded.shape(), wrapped.shape());
    // Integer-valued samples keep every partial sum exact.
    assert_eq!(folded.total(), wrapped.data().total() * folded.rows() as f64);

    let profiles = fold_profiles(&wrapped, &fold_options).expect("power-of-two rows fold");
    let valid_count = valid.iter().filter(|&&flag| flag).count() as f64;
    assert_eq!(profiles.counts.total(), valid_count * folded.rows() as f64);
});

#![no_main]

use arbitrary::Arbitrary;
use ffa_fold::{FoldedArray, Shape2D, fold_stage, plan};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct PlanStageInput {
    stage: u8,
    rows_log2: u8,
    cols: u8,
    values: Vec<i8>,
}

fuzz_target!(|input: PlanStageInput| {
    let stage = u32::from(input.stage % 12);
    let Ok(butterfly) = plan(stage) else {
        assert_eq!(stage, 0);
        return;
    };
    let size = 1usize << stage;
    assert_eq!(butterfly.group_size(), size);
    assert_eq!(butterfly.max_shift(), size / 2);

    let rows = 1usize << (input.rows_log2 % 10);
    let cols = usize::from(input.cols).max(1);
    let data = (0..rows * cols)
        .map(|i| {
            input
                .values
                .get(i % input.values.len().max(1))
                .map_or(0.0, |&v| f64::from(v))
        })
        .collect();
    let array = FoldedArray::from_vec(Shape2D::new(rows, cols), data).expect("valid shape");
    match fold_stage(&array, stage) {
        Ok(out) => {
            assert!(rows >= size);
            assert_eq!(out.total(), array.total() * 2.0);
        }
        Err(_) => assert!(rows < size),
    }
});

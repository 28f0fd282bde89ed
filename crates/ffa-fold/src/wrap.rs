use serde::{Deserialize, Serialize};

use crate::array::{FoldError, FoldResult, FoldedArray, Shape2D};

/// How [`wrap`] pads the tail of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WrapOptions {
    /// Value written into every padded slot.
    pub fill_value: f64,
    /// Append fully invalid rows until the row count is a power of two.
    pub pad_to_pow2: bool,
}

impl WrapOptions {
    #[must_use]
    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = fill_value;
        self
    }

    #[must_use]
    pub fn with_pad_to_pow2(mut self, pad_to_pow2: bool) -> Self {
        self.pad_to_pow2 = pad_to_pow2;
        self
    }
}

/// Which entries of a wrapped array are real samples (`true`) or padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ValidityMaskRepr")]
pub struct ValidityMask {
    shape: Shape2D,
    valid: Vec<bool>,
}

#[derive(Deserialize)]
struct ValidityMaskRepr {
    shape: Shape2D,
    valid: Vec<bool>,
}

impl TryFrom<ValidityMaskRepr> for ValidityMask {
    type Error = FoldError;

    fn try_from(repr: ValidityMaskRepr) -> FoldResult<Self> {
        Self::from_vec(repr.shape, repr.valid)
    }
}

impl ValidityMask {
    pub fn from_vec(shape: Shape2D, valid: Vec<bool>) -> FoldResult<Self> {
        shape.validate()?;
        if valid.len() != shape.len() {
            return Err(FoldError::ShapeMismatch {
                context: "validity mask buffer length",
                expected: shape.len(),
                actual: valid.len(),
            });
        }
        Ok(Self { shape, valid })
    }

    #[must_use]
    pub const fn shape(&self) -> Shape2D {
        self.shape
    }

    #[must_use]
    pub fn is_valid(&self, row: usize, col: usize) -> Option<bool> {
        if row >= self.shape.rows || col >= self.shape.cols {
            return None;
        }
        Some(self.valid[row * self.shape.cols + col])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.valid
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.valid.iter().filter(|&&flag| flag).count()
    }

    /// 1.0 for valid entries and 0.0 for padding, ready to be folded into counts.
    pub fn to_counts(&self) -> FoldResult<FoldedArray> {
        let data = self
            .valid
            .iter()
            .map(|&flag| if flag { 1.0 } else { 0.0 })
            .collect();
        FoldedArray::from_vec(self.shape, data)
    }
}

/// A sequence folded into rows of one trial period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WrappedArrayRepr")]
pub struct WrappedArray {
    data: FoldedArray,
    mask: Option<ValidityMask>,
    base_period: usize,
    samples: usize,
}

#[derive(Deserialize)]
struct WrappedArrayRepr {
    data: FoldedArray,
    mask: Option<ValidityMask>,
    base_period: usize,
    samples: usize,
}

impl TryFrom<WrappedArrayRepr> for WrappedArray {
    type Error = FoldError;

    fn try_from(repr: WrappedArrayRepr) -> FoldResult<Self> {
        let shape = repr.data.shape();
        if repr.base_period != shape.cols {
            return Err(FoldError::ShapeMismatch {
                context: "wrapped base period",
                expected: shape.cols,
                actual: repr.base_period,
            });
        }
        if let Some(mask) = &repr.mask
            && mask.shape() != shape
        {
            return Err(FoldError::ShapeMismatch {
                context: "wrapped validity mask",
                expected: shape.len(),
                actual: mask.shape().len(),
            });
        }
        if repr.samples == 0 {
            return Err(FoldError::EmptyInput);
        }
        if repr.samples > shape.len() {
            return Err(FoldError::ShapeMismatch {
                context: "wrapped sample count",
                expected: shape.len(),
                actual: repr.samples,
            });
        }
        Ok(Self {
            data: repr.data,
            mask: repr.mask,
            base_period: repr.base_period,
            samples: repr.samples,
        })
    }
}

impl WrappedArray {
    #[must_use]
    pub const fn data(&self) -> &FoldedArray {
        &self.data
    }

    #[must_use]
    pub const fn mask(&self) -> Option<&ValidityMask> {
        self.mask.as_ref()
    }

    #[must_use]
    pub const fn shape(&self) -> Shape2D {
        self.data.shape()
    }

    #[must_use]
    pub const fn base_period(&self) -> usize {
        self.base_period
    }

    /// Length of the sequence that was wrapped.
    #[must_use]
    pub const fn samples(&self) -> usize {
        self.samples
    }

    #[must_use]
    pub fn into_parts(self) -> (FoldedArray, Option<ValidityMask>) {
        (self.data, self.mask)
    }

    /// Data with every invalid entry replaced by `fill`.
    pub fn filled(&self, fill: f64) -> FoldResult<FoldedArray> {
        let Some(mask) = &self.mask else {
            return Ok(self.data.clone());
        };
        let data = self
            .data
            .as_slice()
            .iter()
            .zip(mask.as_slice())
            .map(|(&value, &valid)| if valid { value } else { fill })
            .collect();
        FoldedArray::from_vec(self.data.shape(), data)
    }

    /// Per-entry sample counts: the mask as 0/1, or all ones when unmasked.
    pub fn validity_counts(&self) -> FoldResult<FoldedArray> {
        match &self.mask {
            Some(mask) => mask.to_counts(),
            None => FoldedArray::filled_with(self.data.shape(), 1.0),
        }
    }

    /// Row-major flattening truncated to the original length.
    #[must_use]
    pub fn to_sequence(&self) -> Vec<f64> {
        self.data.as_slice()[..self.samples].to_vec()
    }
}

/// Wrap `sequence` on `base_period` samples per row.
///
/// The row count is `len / base_period + 1`, so a sequence whose length is a
/// multiple of the period still gains one full row of padding. A mask is
/// only produced when `pad_to_pow2` is set.
pub fn wrap(
    sequence: &[f64],
    base_period: usize,
    options: &WrapOptions,
) -> FoldResult<WrappedArray> {
    wrap_impl(sequence, None, base_period, options)
}

/// [`wrap`] for a sequence that already flags some samples as invalid.
///
/// Padding is always marked invalid in the returned mask.
pub fn wrap_masked(
    sequence: &[f64],
    valid: &[bool],
    base_period: usize,
    options: &WrapOptions,
) -> FoldResult<WrappedArray> {
    if valid.len() != sequence.len() {
        return Err(FoldError::ShapeMismatch {
            context: "validity mask length",
            expected: sequence.len(),
            actual: valid.len(),
        });
    }
    wrap_impl(sequence, Some(valid), base_period, options)
}

fn wrap_impl(
    sequence: &[f64],
    valid: Option<&[bool]>,
    base_period: usize,
    options: &WrapOptions,
) -> FoldResult<WrappedArray> {
    if base_period == 0 {
        return Err(FoldError::InvalidPeriod {
            period: base_period,
        });
    }
    if sequence.is_empty() {
        return Err(FoldError::EmptyInput);
    }

    let rows = sequence.len() / base_period + 1;
    let padded_rows = if options.pad_to_pow2 {
        rows.checked_next_power_of_two()
            .ok_or_else(|| {
                Shape2D::new(rows, base_period).invalid("padded row count overflows usize")
            })?
    } else {
        rows
    };
    let shape = Shape2D::new(padded_rows, base_period);
    shape.validate()?;

    let mut data = Vec::with_capacity(shape.len());
    data.extend_from_slice(sequence);
    data.resize(shape.len(), options.fill_value);

    let mask = if valid.is_some() || options.pad_to_pow2 {
        let mut flags = Vec::with_capacity(shape.len());
        match valid {
            Some(valid) => flags.extend_from_slice(valid),
            None => flags.resize(sequence.len(), true),
        }
        flags.resize(shape.len(), false);
        Some(ValidityMask::from_vec(shape, flags)?)
    } else {
        None
    };

    Ok(WrappedArray {
        data: FoldedArray::from_vec(shape, data)?,
        mask,
        base_period,
        samples: sequence.len(),
    })
}

/// Trial period carried by each folded row: `P0 + k / (rows - 1)`.
#[must_use]
pub fn trial_periods(base_period: usize, rows: usize) -> Vec<f64> {
    let base = base_period as f64;
    if rows <= 1 {
        return vec![base; rows];
    }
    let step = (rows - 1) as f64;
    (0..rows).map(|k| base + k as f64 / step).collect()
}

#[cfg(test)]
mod tests {
    use super::{WrapOptions, WrappedArray, trial_periods, wrap, wrap_masked};
    use crate::array::{FoldError, Shape2D};

    #[test]
    fn wraps_and_pads_final_row() {
        let seq = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let wrapped = wrap(&seq, 3, &WrapOptions::default()).expect("wrap");
        assert_eq!(wrapped.shape(), Shape2D::new(3, 3));
        assert_eq!(
            wrapped.data().to_rows(),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 0.0, 0.0]]
        );
        assert!(wrapped.mask().is_none());
        assert_eq!(wrapped.to_sequence(), seq.to_vec());
    }

    #[test]
    fn exact_multiple_still_gains_a_padding_row() {
        let wrapped = wrap(&[1.0, 2.0, 3.0, 4.0], 2, &WrapOptions::default()).expect("wrap");
        assert_eq!(wrapped.shape(), Shape2D::new(3, 2));
        assert_eq!(wrapped.data().row(2), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn pow2_padding_appends_masked_fill_rows() {
        let seq = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let opts = WrapOptions::default()
            .with_fill_value(-1.0)
            .with_pad_to_pow2(true);
        let wrapped = wrap(&seq, 3, &opts).expect("wrap");
        assert_eq!(wrapped.shape(), Shape2D::new(4, 3));
        assert_eq!(wrapped.data().row(3), Some(&[-1.0, -1.0, -1.0][..]));
        assert_eq!(wrapped.data().row(2), Some(&[7.0, -1.0, -1.0][..]));

        let mask = wrapped.mask().expect("pow2 padding produces a mask");
        assert_eq!(mask.count_valid(), 7);
        assert_eq!(mask.is_valid(2, 0), Some(true));
        assert_eq!(mask.is_valid(2, 1), Some(false));
        assert_eq!(mask.is_valid(3, 2), Some(false));
    }

    #[test]
    fn input_mask_is_carried_and_padding_is_invalid() {
        let seq = [1.0, 2.0, 3.0, 4.0, 5.0];
        let valid = [true, false, true, true, true];
        let wrapped = wrap_masked(&seq, &valid, 2, &WrapOptions::default()).expect("wrap");
        let mask = wrapped.mask().expect("masked input keeps a mask");
        assert_eq!(mask.as_slice(), &[true, false, true, true, true, false]);

        let filled = wrapped.filled(0.0).expect("filled");
        assert_eq!(filled.as_slice(), &[1.0, 0.0, 3.0, 4.0, 5.0, 0.0]);
        let counts = wrapped.validity_counts().expect("counts");
        assert_eq!(counts.total(), 4.0);
    }

    #[test]
    fn mask_length_must_match_sequence() {
        let err = wrap_masked(&[1.0, 2.0], &[true], 1, &WrapOptions::default())
            .expect_err("short mask");
        assert!(matches!(err, FoldError::ShapeMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn zero_period_and_empty_input_are_rejected() {
        assert_eq!(
            wrap(&[1.0], 0, &WrapOptions::default()),
            Err(FoldError::InvalidPeriod { period: 0 })
        );
        assert_eq!(
            wrap(&[], 4, &WrapOptions::default()),
            Err(FoldError::EmptyInput)
        );
    }

    #[test]
    fn unmasked_counts_are_all_ones() {
        let wrapped = wrap(&[1.0, 2.0, 3.0], 2, &WrapOptions::default()).expect("wrap");
        let counts = wrapped.validity_counts().expect("counts");
        assert_eq!(counts.total(), 4.0);
    }

    #[test]
    fn trial_periods_span_one_sample() {
        assert_eq!(trial_periods(10, 5), vec![10.0, 10.25, 10.5, 10.75, 11.0]);
        assert_eq!(trial_periods(7, 1), vec![7.0]);
        assert!(trial_periods(7, 0).is_empty());
    }

    #[test]
    fn decoding_rejects_inconsistent_wrapped_arrays() {
        let data = r#"{"shape":{"rows":1,"cols":2},"data":[1.0,2.0]}"#;
        let too_many = format!(r#"{{"data":{data},"mask":null,"base_period":2,"samples":9}}"#);
        let err = serde_json::from_str::<WrappedArray>(&too_many).expect_err("samples > len");
        assert!(err.to_string().contains("wrapped sample count"));

        let wrong_period = format!(r#"{{"data":{data},"mask":null,"base_period":3,"samples":2}}"#);
        let err = serde_json::from_str::<WrappedArray>(&wrong_period).expect_err("period != cols");
        assert!(err.to_string().contains("wrapped base period"));

        let short_mask = format!(
            r#"{{"data":{data},"mask":{{"shape":{{"rows":1,"cols":2}},"valid":[true]}},"base_period":2,"samples":2}}"#
        );
        let err = serde_json::from_str::<WrappedArray>(&short_mask).expect_err("mask buffer");
        assert!(err.to_string().contains("validity mask buffer length"));

        let wrapped = wrap(&[1.0, 2.0, 3.0], 2, &WrapOptions::default().with_pad_to_pow2(true))
            .expect("wrap");
        let json = serde_json::to_string(&wrapped).expect("encode");
        let decoded = serde_json::from_str::<WrappedArray>(&json).expect("decode");
        assert_eq!(decoded.to_sequence(), vec![1.0, 2.0, 3.0]);
        assert_eq!(decoded, wrapped);
    }
}

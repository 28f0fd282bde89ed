use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type FoldResult<T> = Result<T, FoldError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FoldError {
    #[error("invalid trial period {period}: must be greater than zero")]
    InvalidPeriod { period: usize },
    #[error("input sequence is empty")]
    EmptyInput,
    #[error("invalid shape ({rows}, {cols}): {detail}")]
    InvalidShape {
        rows: usize,
        cols: usize,
        detail: &'static str,
    },
    #[error("invalid stage {stage}: {detail}")]
    InvalidStage { stage: u32, detail: &'static str },
    #[error("remainder {rem} outside [0, {rows}]")]
    InvalidRemainder { rem: usize, rows: usize },
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("non-finite input rejected by policy")]
    NonFiniteInput,
    #[error("invalid worker count: {requested}")]
    InvalidWorkers { requested: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape2D {
    pub rows: usize,
    pub cols: usize,
}

impl Shape2D {
    #[must_use]
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.rows * self.cols
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub(crate) fn validate(self) -> FoldResult<()> {
        if self.rows == 0 {
            return Err(self.invalid("row count must be greater than zero"));
        }
        if self.cols == 0 {
            return Err(self.invalid("column count must be greater than zero"));
        }
        if self.rows.checked_mul(self.cols).is_none() {
            return Err(self.invalid("element count overflows usize"));
        }
        Ok(())
    }

    pub(crate) const fn invalid(self, detail: &'static str) -> FoldError {
        FoldError::InvalidShape {
            rows: self.rows,
            cols: self.cols,
            detail,
        }
    }
}

/// Dense 2-D array of folded sums, addressed by (row, phase bin).
///
/// Storage is a single owned row-major buffer: the row stride is `cols` and
/// the column stride is 1, so a row is always a contiguous slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FoldedArrayRepr")]
pub struct FoldedArray {
    shape: Shape2D,
    data: Vec<f64>,
}

/// Unchecked wire form; decoding goes through [`FoldedArray::from_vec`].
#[derive(Deserialize)]
struct FoldedArrayRepr {
    shape: Shape2D,
    data: Vec<f64>,
}

impl TryFrom<FoldedArrayRepr> for FoldedArray {
    type Error = FoldError;

    fn try_from(repr: FoldedArrayRepr) -> FoldResult<Self> {
        Self::from_vec(repr.shape, repr.data)
    }
}

impl FoldedArray {
    pub fn from_vec(shape: Shape2D, data: Vec<f64>) -> FoldResult<Self> {
        shape.validate()?;
        if data.len() != shape.len() {
            return Err(FoldError::ShapeMismatch {
                context: "array buffer length",
                expected: shape.len(),
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Shape2D) -> FoldResult<Self> {
        Self::filled_with(shape, 0.0)
    }

    pub fn filled_with(shape: Shape2D, value: f64) -> FoldResult<Self> {
        shape.validate()?;
        Ok(Self {
            shape,
            data: vec![value; shape.len()],
        })
    }

    /// Rectangular identity: ones on the main diagonal, zeros elsewhere.
    pub fn eye(rows: usize, cols: usize) -> FoldResult<Self> {
        let mut out = Self::zeros(Shape2D::new(rows, cols))?;
        for idx in 0..rows.min(cols) {
            out.data[idx * cols + idx] = 1.0;
        }
        Ok(out)
    }

    /// Build from nested rows; every row must have the same non-zero length.
    pub fn from_rows(rows: &[Vec<f64>]) -> FoldResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let shape = Shape2D::new(rows.len(), cols);
        shape.validate()?;
        let mut data = Vec::with_capacity(shape.len());
        for row in rows {
            if row.len() != cols {
                return Err(FoldError::ShapeMismatch {
                    context: "row length",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { shape, data })
    }

    #[must_use]
    pub const fn shape(&self) -> Shape2D {
        self.shape
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.shape.rows
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.shape.cols
    }

    #[must_use]
    pub const fn row_stride(&self) -> usize {
        self.shape.cols
    }

    #[must_use]
    pub const fn col_stride(&self) -> usize {
        1
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.shape.rows || col >= self.shape.cols {
            return None;
        }
        Some(self.data[row * self.row_stride() + col * self.col_stride()])
    }

    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.shape.rows {
            return None;
        }
        let start = row * self.row_stride();
        Some(&self.data[start..start + self.shape.cols])
    }

    pub fn row_iter(&self) -> impl ExactSizeIterator<Item = &[f64]> {
        self.data.chunks_exact(self.shape.cols)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.row_iter().map(<[f64]>::to_vec).collect()
    }

    /// Sum over every entry.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    #[must_use]
    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|value| value.is_finite())
    }

    /// Index and value of the largest entry in `row`; the first wins on ties.
    #[must_use]
    pub fn row_argmax(&self, row: usize) -> Option<(usize, f64)> {
        self.row(row)?
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (col, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((col, value)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{FoldError, FoldedArray, Shape2D};

    #[test]
    fn rejects_zero_sized_shapes() {
        let err = FoldedArray::zeros(Shape2D::new(0, 4)).expect_err("zero rows must fail");
        assert!(matches!(err, FoldError::InvalidShape { rows: 0, .. }));
        let err = FoldedArray::zeros(Shape2D::new(4, 0)).expect_err("zero cols must fail");
        assert!(matches!(err, FoldError::InvalidShape { cols: 0, .. }));
    }

    #[test]
    fn from_vec_checks_buffer_length() {
        let err = FoldedArray::from_vec(Shape2D::new(2, 3), vec![0.0; 5])
            .expect_err("buffer must match shape");
        assert_eq!(
            err,
            FoldError::ShapeMismatch {
                context: "array buffer length",
                expected: 6,
                actual: 5,
            }
        );
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = FoldedArray::from_rows(&[vec![1.0, 2.0], vec![3.0]])
            .expect_err("ragged rows must fail");
        assert!(matches!(err, FoldError::ShapeMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn eye_is_rectangular_identity() {
        let eye = FoldedArray::eye(2, 3).expect("eye");
        assert_eq!(eye.to_rows(), vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        assert_eq!(eye.total(), 2.0);
    }

    #[test]
    fn row_addressing_uses_row_major_strides() {
        let array = FoldedArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .expect("rows");
        assert_eq!(array.row_stride(), 3);
        assert_eq!(array.get(1, 2), Some(6.0));
        assert_eq!(array.get(2, 0), None);
        assert_eq!(array.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(array.row_iter().len(), 2);
    }

    #[test]
    fn row_argmax_prefers_first_maximum() {
        let array = FoldedArray::from_rows(&[vec![1.0, 3.0, 3.0]]).expect("rows");
        assert_eq!(array.row_argmax(0), Some((1, 3.0)));
        assert_eq!(array.row_argmax(1), None);
    }

    #[test]
    fn decoding_validates_buffer_against_shape() {
        let err = serde_json::from_str::<FoldedArray>(
            r#"{"shape":{"rows":2,"cols":2},"data":[1.0]}"#,
        )
        .expect_err("short buffer must not decode");
        assert!(err.to_string().contains("array buffer length"));

        let err = serde_json::from_str::<FoldedArray>(r#"{"shape":{"rows":0,"cols":2},"data":[]}"#)
            .expect_err("empty shape must not decode");
        assert!(err.to_string().contains("invalid shape (0, 2)"));

        let array = FoldedArray::eye(2, 2).expect("eye");
        let json = serde_json::to_string(&array).expect("encode");
        assert_eq!(serde_json::from_str::<FoldedArray>(&json).expect("decode"), array);
    }
}

use serde::Serialize;

use crate::array::{FoldError, FoldResult, FoldedArray, Shape2D};

/// Per-row column permutation that rotates row `i` left by a shift growing
/// linearly from 0 on the first row to `rem` on the last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemainderShuffle {
    shape: Shape2D,
    shifts: Vec<usize>,
    indices: Vec<usize>,
}

impl RemainderShuffle {
    #[must_use]
    pub const fn shape(&self) -> Shape2D {
        self.shape
    }

    #[must_use]
    pub fn shifts(&self) -> &[usize] {
        &self.shifts
    }

    #[must_use]
    pub fn shift(&self, row: usize) -> Option<usize> {
        self.shifts.get(row).copied()
    }

    /// Source column for every output column of `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[usize]> {
        if row >= self.shape.rows {
            return None;
        }
        let start = row * self.shape.cols;
        Some(&self.indices[start..start + self.shape.cols])
    }

    /// Gather `array` through the column map; shapes must agree.
    pub fn apply(&self, array: &FoldedArray) -> FoldResult<FoldedArray> {
        if array.shape() != self.shape {
            return Err(FoldError::ShapeMismatch {
                context: "remainder shuffle elements",
                expected: self.shape.len(),
                actual: array.shape().len(),
            });
        }
        let cols = self.shape.cols;
        let data = array
            .row_iter()
            .zip(self.indices.chunks_exact(cols))
            .flat_map(|(row, map)| map.iter().map(move |&col| row[col]))
            .collect();
        FoldedArray::from_vec(self.shape, data)
    }
}

/// Column map for folding with a fractional remainder.
///
/// Row `i` is shifted by `i * rem / (rows - 1)` rounded half to even, so the
/// last row moves by exactly `rem`.
pub fn remainder_shuffle(shape: Shape2D, rem: usize) -> FoldResult<RemainderShuffle> {
    shape.validate()?;
    if rem > shape.rows {
        return Err(FoldError::InvalidRemainder {
            rem,
            rows: shape.rows,
        });
    }

    let shifts = if shape.rows == 1 {
        vec![0]
    } else {
        let span = (shape.rows - 1) as f64;
        (0..shape.rows)
            .map(|row| (row as f64 * rem as f64 / span).round_ties_even() as usize)
            .collect::<Vec<_>>()
    };

    let indices = shifts
        .iter()
        .flat_map(|&shift| (0..shape.cols).map(move |col| (col + shift) % shape.cols))
        .collect();

    Ok(RemainderShuffle {
        shape,
        shifts,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::remainder_shuffle;
    use crate::array::{FoldError, FoldedArray, Shape2D};

    #[test]
    fn shifts_ramp_from_zero_to_remainder() {
        let map = remainder_shuffle(Shape2D::new(5, 4), 3).expect("shuffle");
        // 0, 0.75, 1.5, 2.25, 3 with ties to even
        assert_eq!(map.shifts(), &[0, 1, 2, 2, 3]);
        assert_eq!(map.row(0), Some(&[0, 1, 2, 3][..]));
        assert_eq!(map.row(4), Some(&[3, 0, 1, 2][..]));
        assert_eq!(map.row(5), None);
    }

    #[test]
    fn half_way_shifts_round_to_even() {
        let map = remainder_shuffle(Shape2D::new(3, 6), 1).expect("shuffle");
        assert_eq!(map.shifts(), &[0, 0, 1]);
    }

    #[test]
    fn zero_remainder_is_identity() {
        let map = remainder_shuffle(Shape2D::new(4, 3), 0).expect("shuffle");
        let array = FoldedArray::eye(4, 3).expect("eye");
        assert_eq!(map.apply(&array).expect("apply"), array);
    }

    #[test]
    fn single_row_never_shifts() {
        let map = remainder_shuffle(Shape2D::new(1, 3), 1).expect("shuffle");
        assert_eq!(map.shift(0), Some(0));
    }

    #[test]
    fn apply_rotates_rows_left() {
        let map = remainder_shuffle(Shape2D::new(2, 3), 2).expect("shuffle");
        let array = FoldedArray::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .expect("rows");
        let shuffled = map.apply(&array).expect("apply");
        assert_eq!(
            shuffled.to_rows(),
            vec![vec![1.0, 2.0, 3.0], vec![6.0, 4.0, 5.0]]
        );
    }

    #[test]
    fn remainder_above_row_count_is_rejected() {
        let err = remainder_shuffle(Shape2D::new(4, 8), 5).expect_err("rem > rows");
        assert_eq!(err, FoldError::InvalidRemainder { rem: 5, rows: 4 });
        assert!(remainder_shuffle(Shape2D::new(4, 8), 4).is_ok());
    }

    #[test]
    fn apply_checks_shape() {
        let map = remainder_shuffle(Shape2D::new(2, 2), 1).expect("shuffle");
        let array = FoldedArray::eye(2, 3).expect("eye");
        assert!(matches!(
            map.apply(&array),
            Err(FoldError::ShapeMismatch { expected: 4, actual: 6, .. })
        ));
    }
}

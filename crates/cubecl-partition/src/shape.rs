use crate::TilingError;
use crate::tiling::MAX_TRAILING_DIMS;

/// Canonical 2D view of a partition problem: `rows` rows of `row_width` elements, one
/// partition id per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedShape {
    /// Number of rows (H), the number of partition ids.
    pub rows: usize,
    /// Number of elements of a row (W).
    pub row_width: usize,
    /// Dimensions of the input beyond the rank of the partition ids, the shape of a row.
    pub trailing_dims: Vec<usize>,
    /// The input is a scalar, a single row of a single element.
    pub x_is_scalar: bool,
    /// The input has no element.
    pub x_is_empty: bool,
    /// The partition ids are a scalar or have no element.
    pub ids_degenerate: bool,
}

impl NormalizedShape {
    /// Collapses the input of shape `x_shape` into rows indexed by ids of shape `ids_shape`.
    ///
    /// The ids shape must be a prefix of the input shape.
    pub fn new(x_shape: &[usize], ids_shape: &[usize]) -> Result<Self, TilingError> {
        if ids_shape.len() > x_shape.len() {
            return Err(TilingError::RankMismatch {
                input: x_shape.len(),
                ids: ids_shape.len(),
            });
        }

        if let Some((axis, (input, ids))) = x_shape
            .iter()
            .zip(ids_shape)
            .enumerate()
            .find(|(_, (input, ids))| input != ids)
        {
            return Err(TilingError::DimMismatch {
                axis,
                input: *input,
                ids: *ids,
            });
        }

        let trailing_dims = x_shape[ids_shape.len()..].to_vec();
        if trailing_dims.len() > MAX_TRAILING_DIMS {
            return Err(TilingError::TooManyDims(trailing_dims.len()));
        }

        let num_elems = checked_size(x_shape, 1)?;
        let rows = checked_size(ids_shape, 1)?;
        let row_width = checked_size(&trailing_dims, 1)?;

        Ok(Self {
            rows,
            row_width,
            trailing_dims,
            x_is_scalar: x_shape.is_empty(),
            x_is_empty: num_elems == 0,
            ids_degenerate: ids_shape.is_empty() || rows == 0,
        })
    }
}

/// Number of elements of `shape` times `unit`, failing instead of overflowing.
pub(crate) fn checked_size(shape: &[usize], unit: usize) -> Result<usize, TilingError> {
    shape
        .iter()
        .try_fold(unit, |size, dim| size.checked_mul(*dim))
        .ok_or_else(|| TilingError::ShapeOverflow(shape.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collapses_leading_dims() {
        let shape = NormalizedShape::new(&[2, 3, 20, 1000], &[2, 3, 20]).unwrap();

        assert_eq!(shape.rows, 120);
        assert_eq!(shape.row_width, 1000);
        assert_eq!(shape.trailing_dims, vec![1000]);
        assert!(!shape.x_is_scalar && !shape.x_is_empty && !shape.ids_degenerate);
    }

    #[test]
    fn ids_covering_the_input_give_unit_rows() {
        let shape = NormalizedShape::new(&[4, 5], &[4, 5]).unwrap();

        assert_eq!(shape.rows, 20);
        assert_eq!(shape.row_width, 1);
        assert!(shape.trailing_dims.is_empty());
    }

    #[test]
    fn scalar_ids_select_the_whole_input() {
        let shape = NormalizedShape::new(&[4, 5], &[]).unwrap();

        assert_eq!(shape.rows, 1);
        assert_eq!(shape.row_width, 20);
        assert_eq!(shape.trailing_dims, vec![4, 5]);
        assert!(shape.ids_degenerate);
    }

    #[test]
    fn scalar_input() {
        let shape = NormalizedShape::new(&[], &[]).unwrap();

        assert_eq!((shape.rows, shape.row_width), (1, 1));
        assert!(shape.x_is_scalar);
        assert!(!shape.x_is_empty);
    }

    #[test]
    fn empty_input() {
        let shape = NormalizedShape::new(&[3, 0], &[3]).unwrap();
        assert!(shape.x_is_empty);
        assert!(!shape.ids_degenerate);

        let shape = NormalizedShape::new(&[0, 4], &[0]).unwrap();
        assert!(shape.x_is_empty);
        assert!(shape.ids_degenerate);
    }

    #[test]
    fn rejects_mismatched_dims() {
        assert_eq!(
            NormalizedShape::new(&[2, 3, 4], &[2, 4]),
            Err(TilingError::DimMismatch {
                axis: 1,
                input: 3,
                ids: 4
            })
        );
        assert_eq!(
            NormalizedShape::new(&[2], &[2, 1]),
            Err(TilingError::RankMismatch { input: 1, ids: 2 })
        );
    }

    #[test]
    fn rejects_too_many_trailing_dims() {
        assert_eq!(
            NormalizedShape::new(&[2, 1, 1, 1, 1, 1, 1, 1, 1], &[2]),
            Err(TilingError::TooManyDims(8))
        );
    }

    #[test]
    fn rejects_overflowing_shapes() {
        assert_eq!(
            NormalizedShape::new(&[usize::MAX, 2], &[usize::MAX]),
            Err(TilingError::ShapeOverflow(vec![usize::MAX, 2]))
        );
        assert_eq!(
            NormalizedShape::new(&[2, usize::MAX / 2, 3], &[2]),
            Err(TilingError::ShapeOverflow(vec![2, usize::MAX / 2, 3]))
        );
    }

    #[test]
    fn zero_dims_never_overflow() {
        let shape = NormalizedShape::new(&[0, usize::MAX], &[0]).unwrap();
        assert!(shape.x_is_empty);
    }
}

use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::{Array1, Array2};

use crate::error::{FactorizeError, Result};
use crate::Flt;

/// An items × users matrix of observed ratings.
///
/// Rows are items and columns are users throughout the crate. Only nonzero
/// cells are observations: explicit zeros are dropped on construction, so
/// every iteration over ratings goes through the stored entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRatingMatrix {
    data: CsrMatrix<Flt>,
}

impl SparseRatingMatrix {
    /// Builds the matrix from `(item, user, rating)` triplets.
    ///
    /// Duplicate positions are summed. Non-finite ratings are rejected.
    pub fn from_triplets(
        no_items: usize,
        no_users: usize,
        items: Vec<usize>,
        users: Vec<usize>,
        values: Vec<Flt>,
    ) -> Result<SparseRatingMatrix> {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(FactorizeError::InvalidRating {
                item: items.get(i).copied().unwrap_or_default(),
                user: users.get(i).copied().unwrap_or_default(),
                value: values[i],
            });
        }
        let coo = CooMatrix::try_from_triplets(no_items, no_users, items, users, values)
            .map_err(|e| FactorizeError::Sparse(e.to_string()))?;
        Ok(Self::from_csr(CsrMatrix::from(&coo)))
    }

    /// Builds the matrix from a dense array, treating zero cells as unobserved.
    pub fn from_dense(dense: &Array2<Flt>) -> Result<SparseRatingMatrix> {
        let (no_items, no_users) = dense.dim();
        let mut items = Vec::new();
        let mut users = Vec::new();
        let mut values = Vec::new();
        for ((d, n), &v) in dense.indexed_iter() {
            if v != 0.0 {
                items.push(d);
                users.push(n);
                values.push(v);
            }
        }
        Self::from_triplets(no_items, no_users, items, users, values)
    }

    fn from_csr(csr: CsrMatrix<Flt>) -> SparseRatingMatrix {
        SparseRatingMatrix {
            data: csr.filter(|_, _, v| *v != 0.0),
        }
    }

    pub fn no_items(&self) -> usize {
        self.data.nrows()
    }

    pub fn no_users(&self) -> usize {
        self.data.ncols()
    }

    /// `(items, users)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.data.nrows(), self.data.ncols())
    }

    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// The rating at `(item, user)`, or 0 when the cell is unobserved or out of range.
    pub fn get(&self, item: usize, user: usize) -> Flt {
        self.data
            .get_entry(item, user)
            .map(|entry| entry.into_value())
            .unwrap_or(0.0)
    }

    /// Observed positions as `(item, user)` pairs in row-major order.
    pub fn nonzero(&self) -> Vec<(usize, usize)> {
        self.data
            .triplet_iter()
            .map(|(d, n, _)| (d, n))
            .collect()
    }

    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, Flt)> + '_ {
        self.data.triplet_iter().map(|(d, n, v)| (d, n, *v))
    }

    /// Swaps the item and user axes.
    pub fn transpose(&self) -> SparseRatingMatrix {
        SparseRatingMatrix {
            data: self.data.transpose(),
        }
    }

    /// Mean observed rating of every item; 0 for items without ratings.
    pub fn item_means(&self) -> Array1<Flt> {
        Array1::from_iter(self.data.row_iter().map(|row| {
            if row.nnz() == 0 {
                0.0
            } else {
                row.values().iter().sum::<Flt>() / row.nnz() as Flt
            }
        }))
    }

    pub fn to_dense(&self) -> Array2<Flt> {
        let mut dense = Array2::zeros(self.shape());
        self.triplets().for_each(|(d, n, v)| dense[[d, n]] = v);
        dense
    }

    pub fn ensure_same_shape(&self, other: &SparseRatingMatrix) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(FactorizeError::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        Ok(())
    }

    pub(crate) fn csr(&self) -> &CsrMatrix<Flt> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_ok::assert_ok;
    use ndarray::array;

    #[test]
    fn test_zero_cells_are_not_observations() {
        let dense = array![[5.0, 0.0, 3.0], [0.0, 0.0, 1.0]];
        let ratings = SparseRatingMatrix::from_dense(&dense).unwrap();
        assert_eq!(ratings.shape(), (2, 3));
        assert_eq!(ratings.nnz(), 3);
        assert_eq!(ratings.nonzero(), vec![(0, 0), (0, 2), (1, 2)]);
        assert_eq!(ratings.get(0, 1), 0.0);
        assert_eq!(ratings.to_dense(), dense);
    }

    #[test]
    fn test_explicit_zero_triplets_dropped() {
        let ratings = SparseRatingMatrix::from_triplets(
            2,
            2,
            vec![0, 1, 1],
            vec![0, 0, 1],
            vec![4.0, 0.0, 2.0],
        )
        .unwrap();
        assert_eq!(ratings.nnz(), 2);
        assert_eq!(ratings.nonzero(), vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_non_finite_rating_rejected() {
        let err =
            SparseRatingMatrix::from_triplets(2, 2, vec![0, 1], vec![1, 0], vec![1.0, Flt::NAN])
                .unwrap_err();
        assert!(matches!(
            err,
            FactorizeError::InvalidRating {
                item: 1,
                user: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_bounds_triplet_rejected() {
        let err = SparseRatingMatrix::from_triplets(2, 2, vec![2], vec![0], vec![1.0]).unwrap_err();
        assert!(matches!(err, FactorizeError::Sparse(_)));
    }

    #[test]
    fn test_transpose_and_item_means() {
        let dense = array![[4.0, 2.0], [0.0, 0.0], [0.0, 5.0]];
        let ratings = SparseRatingMatrix::from_dense(&dense).unwrap();
        assert_eq!(ratings.item_means(), array![3.0, 0.0, 5.0]);

        let transposed = ratings.transpose();
        assert_eq!(transposed.shape(), (2, 3));
        assert_eq!(transposed.to_dense(), dense.t().to_owned());
    }

    #[test]
    fn test_shape_check() {
        let a = SparseRatingMatrix::from_dense(&Array2::ones((2, 3))).unwrap();
        let b = SparseRatingMatrix::from_dense(&Array2::ones((3, 2))).unwrap();
        assert_ok!(a.ensure_same_shape(&a.clone()));
        assert!(matches!(
            a.ensure_same_shape(&b),
            Err(FactorizeError::ShapeMismatch { expected: (2, 3), actual: (3, 2) })
        ));
    }
}

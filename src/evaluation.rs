use ndarray::Array2;

use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Root-mean-square error over exactly the given `(item, user)` observations.
///
/// Only the listed cells are scored; unobserved cells are never errors. An
/// empty list scores 0.
///
/// # Panics
///
/// If an observation lies outside `item_features` rows or `user_features` rows.
pub fn rmse(
    ratings: &SparseRatingMatrix,
    user_features: &Array2<Flt>,
    item_features: &Array2<Flt>,
    observations: &[(usize, usize)],
) -> Flt {
    if observations.is_empty() {
        return 0.0;
    }
    let squared_error = observations
        .iter()
        .map(|&(d, n)| {
            assert!(
                d < item_features.nrows() && n < user_features.nrows(),
                "observation ({}, {}) outside factors of {} items and {} users",
                d,
                n,
                item_features.nrows(),
                user_features.nrows()
            );
            let err = ratings.get(d, n) - item_features.row(d).dot(&user_features.row(n));
            err * err
        })
        .sum::<Flt>();
    (squared_error / observations.len() as Flt).sqrt()
}

/// Dense `items × users` predictions, `item_features · user_featuresᵀ`.
pub fn predict(item_features: &Array2<Flt>, user_features: &Array2<Flt>) -> Array2<Flt> {
    item_features.dot(&user_features.t())
}

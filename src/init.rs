use ndarray::{s, Array2};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand_isaac::Isaac64Rng;

use crate::error::{FactorizeError, Result};
use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Produces the starting `(user_factors, item_factors)` pair of a run.
///
/// User factors are `no_users × k`, item factors `no_items × k`. All
/// randomness must come from `rng` so that runs stay reproducible.
pub trait FactorInitializer: Send + Sync {
    fn init(
        &self,
        ratings: &SparseRatingMatrix,
        no_components: usize,
        rng: &mut Isaac64Rng,
    ) -> (Array2<Flt>, Array2<Flt>);
}

/// Uniform `[0, 1)` factors whose first item component holds the item's mean rating.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemMeanInitializer;

impl FactorInitializer for ItemMeanInitializer {
    fn init(
        &self,
        ratings: &SparseRatingMatrix,
        no_components: usize,
        rng: &mut Isaac64Rng,
    ) -> (Array2<Flt>, Array2<Flt>) {
        let uniform = Uniform::new(0.0 as Flt, 1.0 as Flt);
        let user_features =
            Array2::random_using((ratings.no_users(), no_components), uniform, rng);
        let mut item_features =
            Array2::random_using((ratings.no_items(), no_components), uniform, rng);
        item_features
            .slice_mut(s![.., 0])
            .assign(&ratings.item_means());
        (user_features, item_features)
    }
}

/// Small centred factors, `(U(0, 1) - 0.5) / k`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformInitializer;

impl FactorInitializer for UniformInitializer {
    fn init(
        &self,
        ratings: &SparseRatingMatrix,
        no_components: usize,
        rng: &mut Isaac64Rng,
    ) -> (Array2<Flt>, Array2<Flt>) {
        let uniform = Uniform::new(0.0 as Flt, 1.0 as Flt);
        let user_features = (Array2::random_using((ratings.no_users(), no_components), uniform, rng)
            - 0.5 as Flt)
            / no_components as Flt;
        let item_features = (Array2::random_using((ratings.no_items(), no_components), uniform, rng)
            - 0.5 as Flt)
            / no_components as Flt;
        (user_features, item_features)
    }
}

/// Runs `initializer` and rejects factors that do not fit `ratings`.
pub(crate) fn initial_factors(
    initializer: &dyn FactorInitializer,
    ratings: &SparseRatingMatrix,
    no_components: usize,
    rng: &mut Isaac64Rng,
) -> Result<(Array2<Flt>, Array2<Flt>)> {
    let (user_features, item_features) = initializer.init(ratings, no_components, rng);
    for (features, rows) in [
        (&user_features, ratings.no_users()),
        (&item_features, ratings.no_items()),
    ] {
        if features.dim() != (rows, no_components) {
            return Err(FactorizeError::ShapeMismatch {
                expected: (rows, no_components),
                actual: features.dim(),
            });
        }
    }
    Ok((user_features, item_features))
}

use crate::error::{FactorizeError, Result};
use crate::random::RandomState;
use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Randomly splits the observed ratings into a train and a test matrix.
///
/// Both halves keep the input shape. The first `round(nnz * (1 - test_percentage))`
/// shuffled observations go to train, the rest to test.
pub fn random_train_test_split(
    ratings: &SparseRatingMatrix,
    test_percentage: f64,
    random_seed: u64,
) -> Result<(SparseRatingMatrix, SparseRatingMatrix)> {
    if !(0.0..=1.0).contains(&test_percentage) {
        return Err(FactorizeError::invalid_parameter(
            "test_percentage",
            format!("must lie in [0, 1], got {}", test_percentage),
        ));
    }
    let mut random_state = RandomState::seeded(random_seed);
    let mut triplets = ratings.triplets().collect::<Vec<(usize, usize, Flt)>>();
    random_state.shuffle(&mut triplets)?;

    let cutoff = (triplets.len() as f64 * (1.0 - test_percentage)).round() as usize;
    let (no_items, no_users) = ratings.shape();
    let build = |part: &[(usize, usize, Flt)]| {
        SparseRatingMatrix::from_triplets(
            no_items,
            no_users,
            part.iter().map(|t| t.0).collect(),
            part.iter().map(|t| t.1).collect(),
            part.iter().map(|t| t.2).collect(),
        )
    };
    Ok((build(&triplets[..cutoff])?, build(&triplets[cutoff..])?))
}

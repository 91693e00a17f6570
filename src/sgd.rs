use ndarray::Array2;
use tqdm::Iter;
use tracing::info;

use crate::error::{check_components, check_regularization, FactorizeError, Result};
use crate::evaluation::{predict, rmse};
use crate::init::{initial_factors, FactorInitializer, ItemMeanInitializer};
use crate::random::{RandomState, DEFAULT_SEED};
use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Full passes over the training observations; there is no early stop.
pub const NUM_EPOCHS: usize = 60;

/// The step size is divided by this once at the start of every epoch.
pub const DECAY: Flt = 1.2;

#[derive(Debug, Clone, PartialEq)]
pub struct SgdParams {
    pub learning_rate: Flt,
    pub num_features: usize,
    pub lambda_user: Flt,
    pub lambda_item: Flt,
    pub seed: u64,
    /// Show a progress bar over the epochs.
    pub verbose: bool,
}

impl Default for SgdParams {
    fn default() -> SgdParams {
        SgdParams {
            learning_rate: 0.05,
            num_features: 20,
            lambda_user: 0.1,
            lambda_item: 0.1,
            seed: DEFAULT_SEED,
            verbose: false,
        }
    }
}

impl SgdParams {
    pub fn new(
        learning_rate: Flt,
        num_features: usize,
        lambda_user: Flt,
        lambda_item: Flt,
    ) -> SgdParams {
        SgdParams {
            learning_rate,
            num_features,
            lambda_user,
            lambda_item,
            ..SgdParams::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(FactorizeError::invalid_parameter(
                "learning_rate",
                format!("must be a finite positive number, got {}", self.learning_rate),
            ));
        }
        check_components(self.num_features)?;
        check_regularization("lambda_user", self.lambda_user)?;
        check_regularization("lambda_item", self.lambda_item)
    }
}

#[derive(Debug, Clone)]
pub struct SgdOutcome {
    /// `items × users`.
    pub predictions: Array2<Flt>,
    pub user_features: Array2<Flt>,
    pub item_features: Array2<Flt>,
    /// RMSE on the test observations, 0 when no test matrix was given.
    pub test_rmse: Flt,
    /// Step size used during each epoch.
    pub learning_rates: Vec<Flt>,
    /// Train RMSE after each epoch.
    pub rmse_history: Vec<Flt>,
}

/// Plain per-observation SGD with L2 regularization and a decaying step size.
pub struct Sgd {
    params: SgdParams,
    initializer: Box<dyn FactorInitializer>,
}

impl Sgd {
    pub fn new(params: SgdParams) -> Result<Sgd> {
        params.validate()?;
        Ok(Sgd {
            params,
            initializer: Box::new(ItemMeanInitializer),
        })
    }

    pub fn with_initializer<I: FactorInitializer + 'static>(mut self, initializer: I) -> Sgd {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn params(&self) -> &SgdParams {
        &self.params
    }

    pub fn fit(
        &self,
        train: &SparseRatingMatrix,
        test: Option<&SparseRatingMatrix>,
    ) -> Result<SgdOutcome> {
        if let Some(test) = test {
            train.ensure_same_shape(test)?;
        }
        let params = &self.params;
        let mut random_state = RandomState::seeded(params.seed);
        let (mut user_features, mut item_features) = initial_factors(
            self.initializer.as_ref(),
            train,
            params.num_features,
            &mut random_state.rng,
        )?;

        let mut nz_train = train.nonzero();
        let nz_test = test.map(|test| test.nonzero());

        let mut gamma = params.learning_rate;
        let mut learning_rates = Vec::with_capacity(NUM_EPOCHS);
        let mut rmse_history = Vec::with_capacity(NUM_EPOCHS);
        for epoch in Self::process(NUM_EPOCHS, params.verbose) {
            random_state.shuffle(&mut nz_train)?;
            gamma /= DECAY;
            learning_rates.push(gamma);

            run_epoch(
                train,
                &nz_train,
                &mut user_features,
                &mut item_features,
                gamma,
                params.lambda_user,
                params.lambda_item,
            );

            let train_rmse = rmse(train, &user_features, &item_features, &nz_train);
            if test.is_some() {
                info!("iter: {}, RMSE on training set: {}.", epoch, train_rmse);
            } else {
                info!("iter: {}, RMSE: {}.", epoch, train_rmse);
            }
            rmse_history.push(train_rmse);
        }

        let test_rmse = match (test, nz_test) {
            (Some(test), Some(nz_test)) => {
                let test_rmse = rmse(test, &user_features, &item_features, &nz_test);
                info!(
                    "RMSE on test data: {} with gamma={}, k={}, lambda_u={}, lambda_i={}.",
                    test_rmse,
                    params.learning_rate,
                    params.num_features,
                    params.lambda_user,
                    params.lambda_item
                );
                test_rmse
            }
            _ => 0.0,
        };

        Ok(SgdOutcome {
            predictions: predict(&item_features, &user_features),
            user_features,
            item_features,
            test_rmse,
            learning_rates,
            rmse_history,
        })
    }

    fn process(n: usize, verbose: bool) -> Box<dyn Iterator<Item = usize>> {
        if verbose {
            Box::new((0..n).tqdm())
        } else {
            Box::new(0..n)
        }
    }
}

/// Trains SGD with the default seed; returns the `items × users` prediction
/// and the test RMSE (0 without a test matrix).
pub fn sgd(
    train: &SparseRatingMatrix,
    test: Option<&SparseRatingMatrix>,
    learning_rate: Flt,
    num_features: usize,
    lambda_user: Flt,
    lambda_item: Flt,
) -> Result<(Array2<Flt>, Flt)> {
    let model = Sgd::new(SgdParams::new(learning_rate, num_features, lambda_user, lambda_item))?;
    let outcome = model.fit(train, test)?;
    Ok((outcome.predictions, outcome.test_rmse))
}

/// Step size in effect after `epochs` decays.
pub fn decayed_learning_rate(initial: Flt, epochs: usize) -> Flt {
    initial / DECAY.powi(epochs as i32)
}

/// One pass over `observations` in the given order.
///
/// Both gradients of a step are taken from the rows as they were before the
/// step, then both rows move.
fn run_epoch(
    ratings: &SparseRatingMatrix,
    observations: &[(usize, usize)],
    user_features: &mut Array2<Flt>,
    item_features: &mut Array2<Flt>,
    gamma: Flt,
    lambda_user: Flt,
    lambda_item: Flt,
) {
    let no_components = item_features.ncols();
    for &(d, n) in observations {
        let err = ratings.get(d, n) - item_features.row(d).dot(&user_features.row(n));
        for k in 0..no_components {
            let item_component = item_features[[d, k]];
            let user_component = user_features[[n, k]];
            let item_gradient = -(err * user_component - lambda_item * item_component);
            let user_gradient = -(err * item_component - lambda_user * user_component);
            item_features[[d, k]] -= gamma * item_gradient;
            user_features[[n, k]] -= gamma * user_gradient;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;
    use rand_isaac::Isaac64Rng;

    fn sample() -> SparseRatingMatrix {
        SparseRatingMatrix::from_dense(&array![
            [5.0, 0.0, 3.0, 1.0, 0.0],
            [4.0, 2.0, 0.0, 1.0, 1.0],
            [0.0, 1.0, 5.0, 0.0, 4.0],
            [1.0, 0.0, 4.0, 2.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_step_reads_both_rows_before_writing() {
        let ratings = SparseRatingMatrix::from_dense(&array![[5.0]]).unwrap();
        let mut users = array![[2.0]];
        let mut items = array![[1.0]];
        run_epoch(&ratings, &[(0, 0)], &mut users, &mut items, 0.1, 0.5, 0.5);
        // err = 3; item grad = -(3*2 - 0.5*1), user grad = -(3*1 - 0.5*2)
        assert_relative_eq!(items[[0, 0]], 1.55, epsilon = 1e-12);
        assert_relative_eq!(users[[0, 0]], 2.2, epsilon = 1e-12);
    }

    #[test]
    fn test_runs_exactly_sixty_epochs() {
        for train in [sample(), SparseRatingMatrix::from_dense(&array![[3.0]]).unwrap()] {
            let outcome = Sgd::new(SgdParams::new(0.02, 2, 0.1, 0.1))
                .unwrap()
                .fit(&train, None)
                .unwrap();
            assert_eq!(outcome.learning_rates.len(), NUM_EPOCHS);
            assert_eq!(outcome.rmse_history.len(), NUM_EPOCHS);
            outcome
                .learning_rates
                .iter()
                .enumerate()
                .for_each(|(epoch, gamma)| {
                    assert_relative_eq!(
                        *gamma,
                        decayed_learning_rate(0.02, epoch + 1),
                        max_relative = 1e-12
                    )
                });
        }
    }

    #[test]
    fn test_single_rating_is_approached() {
        let train = SparseRatingMatrix::from_dense(&array![[4.0]]).unwrap();
        let (predictions, test_rmse) = sgd(&train, None, 0.05, 1, 0.0, 0.0).unwrap();
        assert_abs_diff_eq!(predictions[[0, 0]], 4.0, epsilon = 0.1);
        assert_eq!(test_rmse, 0.0);
    }

    #[test]
    fn test_training_reduces_rmse() {
        let train = sample();
        let outcome = Sgd::new(SgdParams::new(0.05, 2, 0.01, 0.01))
            .unwrap()
            .fit(&train, None)
            .unwrap();
        let first = outcome.rmse_history[0];
        let last = *outcome.rmse_history.last().unwrap();
        assert!(last < first, "rmse went from {} to {}", first, last);
    }

    #[test]
    fn test_deterministic() {
        let train = sample();
        let test = SparseRatingMatrix::from_triplets(4, 5, vec![0, 2], vec![1, 0], vec![4.0, 2.0])
            .unwrap();
        let model = Sgd::new(SgdParams::new(0.05, 3, 0.1, 0.1)).unwrap();
        let first = model.fit(&train, Some(&test)).unwrap();
        let second = model.fit(&train, Some(&test)).unwrap();
        assert_eq!(first.predictions, second.predictions);
        assert_eq!(first.user_features, second.user_features);
        assert_eq!(first.test_rmse, second.test_rmse);
        assert!(first.test_rmse > 0.0);
    }

    #[test]
    fn test_seed_changes_outcome() {
        let train = sample();
        let a = Sgd::new(SgdParams::new(0.05, 2, 0.1, 0.1)).unwrap().fit(&train, None).unwrap();
        let params = SgdParams {
            seed: 1,
            ..SgdParams::new(0.05, 2, 0.1, 0.1)
        };
        let b = Sgd::new(params).unwrap().fit(&train, None).unwrap();
        assert_ne!(a.predictions, b.predictions);
    }

    #[test]
    fn test_shape_mismatch_fails_fast() {
        let test = SparseRatingMatrix::from_dense(&Array2::ones((5, 4))).unwrap();
        let err = sgd(&sample(), Some(&test), 0.05, 2, 0.1, 0.1).unwrap_err();
        assert!(matches!(
            err,
            FactorizeError::ShapeMismatch {
                expected: (4, 5),
                actual: (5, 4)
            }
        ));
    }

    #[test]
    fn test_invalid_learning_rate() {
        assert!(matches!(
            Sgd::new(SgdParams::new(0.0, 2, 0.1, 0.1)),
            Err(FactorizeError::InvalidParameter { name: "learning_rate", .. })
        ));
        assert!(matches!(
            Sgd::new(SgdParams::new(0.1, 2, 0.1, Flt::NAN)),
            Err(FactorizeError::InvalidParameter { name: "lambda_item", .. })
        ));
    }

    struct SingleRow;

    impl FactorInitializer for SingleRow {
        fn init(
            &self,
            _ratings: &SparseRatingMatrix,
            no_components: usize,
            _rng: &mut Isaac64Rng,
        ) -> (Array2<Flt>, Array2<Flt>) {
            (Array2::ones((1, no_components)), Array2::ones((1, no_components)))
        }
    }

    #[test]
    fn test_wrong_shaped_initializer_is_an_error() {
        let err = Sgd::new(SgdParams::new(0.05, 2, 0.1, 0.1))
            .unwrap()
            .with_initializer(SingleRow)
            .fit(&sample(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            FactorizeError::ShapeMismatch {
                expected: (5, 2),
                actual: (1, 2)
            }
        ));
    }
}

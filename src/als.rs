use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

use crate::error::{check_components, check_regularization, FactorSide, FactorizeError, Result};
use crate::evaluation::{predict, rmse};
use crate::index_groups::IndexGroups;
use crate::init::{initial_factors, FactorInitializer, ItemMeanInitializer};
use crate::random::{RandomState, DEFAULT_SEED};
use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Training stops once successive train RMSEs differ by no more than this.
pub const STOP_CRITERION: Flt = 1e-4;

/// Smallest accepted `(min pivot / max pivot)²` of a row's Cholesky factor.
const MIN_RCOND: Flt = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct AlsParams {
    pub num_features: usize,
    pub lambda_user: Flt,
    pub lambda_item: Flt,
    pub stop_criterion: Flt,
    /// Optional hard cap on sweeps. `None` relies on the RMSE-delta rule alone.
    pub max_iterations: Option<usize>,
    pub seed: u64,
}

impl Default for AlsParams {
    fn default() -> AlsParams {
        AlsParams {
            num_features: 20,
            lambda_user: 0.1,
            lambda_item: 0.1,
            stop_criterion: STOP_CRITERION,
            max_iterations: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl AlsParams {
    pub fn new(num_features: usize, lambda_user: Flt, lambda_item: Flt) -> AlsParams {
        AlsParams {
            num_features,
            lambda_user,
            lambda_item,
            ..AlsParams::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_components(self.num_features)?;
        check_regularization("lambda_user", self.lambda_user)?;
        check_regularization("lambda_item", self.lambda_item)?;
        if !(self.stop_criterion >= 0.0) {
            return Err(FactorizeError::invalid_parameter(
                "stop_criterion",
                format!("must be non-negative, got {}", self.stop_criterion),
            ));
        }
        Ok(())
    }
}

/// Everything a finished ALS run produced.
#[derive(Debug, Clone)]
pub struct AlsOutcome {
    /// `items × users`.
    pub predictions: Array2<Flt>,
    pub user_features: Array2<Flt>,
    pub item_features: Array2<Flt>,
    pub iterations: usize,
    /// Train RMSE before the first sweep, then after every sweep.
    pub rmse_history: Vec<Flt>,
    pub train_rmse: Flt,
    pub test_rmse: Option<Flt>,
}

/// Alternating least squares with exact per-row regularized solves.
pub struct Als {
    params: AlsParams,
    initializer: Box<dyn FactorInitializer>,
}

impl Als {
    pub fn new(params: AlsParams) -> Result<Als> {
        params.validate()?;
        Ok(Als {
            params,
            initializer: Box::new(ItemMeanInitializer),
        })
    }

    pub fn with_initializer<I: FactorInitializer + 'static>(mut self, initializer: I) -> Als {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn params(&self) -> &AlsParams {
        &self.params
    }

    /// Trains on `train` and scores `test` once converged.
    ///
    /// Sweeps continue while the train RMSE moves by more than
    /// `stop_criterion` between consecutive sweeps. A single small step can
    /// therefore end training early.
    pub fn fit(
        &self,
        train: &SparseRatingMatrix,
        test: Option<&SparseRatingMatrix>,
    ) -> Result<AlsOutcome> {
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

        let groups = IndexGroups::build(train);
        let nz_train = train.nonzero();
        debug!(
            "built index groups for {} users and {} items ({} ratings)",
            groups.items_per_user.len(),
            groups.users_per_item.len(),
            groups.nnz()
        );

        let mut train_rmse = rmse(train, &user_features, &item_features, &nz_train);
        let mut rmse_history = vec![train_rmse];
        let mut previous_rmse = Flt::INFINITY;
        let mut iterations = 0;
        while (previous_rmse - train_rmse).abs() > params.stop_criterion {
            if params.max_iterations.is_some_and(|max| iterations >= max) {
                warn!(
                    "stopping after {} iterations without meeting the stop criterion",
                    iterations
                );
                break;
            }
            user_features = update_features(
                &groups.items_per_user,
                &item_features,
                params.lambda_user,
                FactorSide::User,
            )?;
            item_features = update_features(
                &groups.users_per_item,
                &user_features,
                params.lambda_item,
                FactorSide::Item,
            )?;
            previous_rmse = train_rmse;
            train_rmse = rmse(train, &user_features, &item_features, &nz_train);
            rmse_history.push(train_rmse);
            iterations += 1;
            info!("iter: {}, RMSE on training set: {}.", iterations, train_rmse);
        }

        let test_rmse = test.map(|test| {
            let test_rmse = rmse(test, &user_features, &item_features, &test.nonzero());
            info!("RMSE on testing set: {}.", test_rmse);
            test_rmse
        });

        Ok(AlsOutcome {
            predictions: predict(&item_features, &user_features),
            user_features,
            item_features,
            iterations,
            rmse_history,
            train_rmse,
            test_rmse,
        })
    }
}

/// Trains ALS with the default seed and returns the `items × users` prediction.
pub fn als(
    train: &SparseRatingMatrix,
    test: Option<&SparseRatingMatrix>,
    num_features: usize,
    lambda_user: Flt,
    lambda_item: Flt,
) -> Result<Array2<Flt>> {
    let model = Als::new(AlsParams::new(num_features, lambda_user, lambda_item))?;
    Ok(model.fit(train, test)?.predictions)
}

/// Re-solves every row that has observations against the fixed factors.
///
/// `groups[i]` holds `(index into fixed, rating)` pairs for row `i`. Rows
/// without observations come back as zeros.
fn update_features(
    groups: &[Vec<(usize, Flt)>],
    fixed: &Array2<Flt>,
    lambda: Flt,
    side: FactorSide,
) -> Result<Array2<Flt>> {
    let mut updated = Array2::zeros((groups.len(), fixed.ncols()));
    for (index, group) in groups.iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let solution = solve_row(fixed, group, lambda, side, index)?;
        updated.row_mut(index).assign(&solution);
    }
    Ok(updated)
}

/// Solves `(Fᵀ F + λ I) x = Fᵀ r` for one row, `F` being the rows of `fixed` in `group`.
fn solve_row(
    fixed: &Array2<Flt>,
    group: &[(usize, Flt)],
    lambda: Flt,
    side: FactorSide,
    index: usize,
) -> Result<Array1<Flt>> {
    let no_components = fixed.ncols();
    let mut a = DMatrix::<Flt>::identity(no_components, no_components) * lambda;
    let mut b = DVector::<Flt>::zeros(no_components);
    for &(j, rating) in group {
        let row = fixed.row(j);
        for p in 0..no_components {
            b[p] += rating * row[p];
            for q in 0..no_components {
                a[(p, q)] += row[p] * row[q];
            }
        }
    }

    let cholesky = a
        .cholesky()
        .ok_or(FactorizeError::SingularSystem { side, index })?;
    let (min_pivot, max_pivot) = cholesky
        .l_dirty()
        .diagonal()
        .iter()
        .fold((Flt::INFINITY, 0.0 as Flt), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    let rcond = (min_pivot / max_pivot).powi(2);
    if !(rcond >= MIN_RCOND) {
        return Err(FactorizeError::IllConditioned { side, index, rcond });
    }

    let solution = cholesky.solve(&b);
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(FactorizeError::SingularSystem { side, index });
    }
    Ok(Array1::from_iter(solution.iter().copied()))
}

use std::str::FromStr;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crate::als::{Als, AlsParams};
use crate::error::{FactorizeError, Result};
use crate::ratings::SparseRatingMatrix;
use crate::sgd::{Sgd, SgdParams};
use crate::Flt;

/// Default number of concurrent training runs.
pub const SEARCH_WORKERS: usize = 3;

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum Algorithm {
    Als,
    Sgd,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "als" => Ok(Algorithm::Als),
            "sgd" => Ok(Algorithm::Sgd),
            _ => Err(format!("Invalid algorithm: {}", s)),
        }
    }
}

/// One candidate configuration of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchParams {
    Als(AlsParams),
    Sgd(SgdParams),
}

impl SearchParams {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            SearchParams::Als(_) => Algorithm::Als,
            SearchParams::Sgd(_) => Algorithm::Sgd,
        }
    }

    /// Runs one independent training and returns its test RMSE.
    pub fn evaluate(&self, train: &SparseRatingMatrix, test: &SparseRatingMatrix) -> Result<Flt> {
        match self {
            SearchParams::Als(params) => {
                let outcome = Als::new(params.clone())?.fit(train, Some(test))?;
                Ok(outcome.test_rmse.unwrap_or_default())
            }
            SearchParams::Sgd(params) => {
                Ok(Sgd::new(params.clone())?.fit(train, Some(test))?.test_rmse)
            }
        }
    }
}

#[derive(Debug)]
pub struct SearchResult {
    pub params: SearchParams,
    pub test_rmse: Result<Flt>,
}

/// Trains every candidate on a pool of `workers` threads.
///
/// Runs share the read-only inputs and nothing else; each builds its own
/// model, generator and factors. Results come back in candidate order. A
/// failed run is reported in its own result and does not stop the others.
pub fn run_search(
    train: &SparseRatingMatrix,
    test: &SparseRatingMatrix,
    candidates: &[SearchParams],
    workers: usize,
) -> Result<Vec<SearchResult>> {
    if workers == 0 {
        return Err(FactorizeError::invalid_parameter("workers", "must be at least 1"));
    }
    train.ensure_same_shape(test)?;
    let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
    info!(
        "searching {} configurations on {} workers",
        candidates.len(),
        workers
    );

    let results = pool.install(|| {
        candidates
            .par_iter()
            .map(|params| {
                let test_rmse = params.evaluate(train, test);
                if let Err(e) = &test_rmse {
                    warn!("{:?} run failed: {}", params.algorithm(), e);
                }
                SearchResult {
                    params: params.clone(),
                    test_rmse,
                }
            })
            .collect::<Vec<_>>()
    });
    Ok(results)
}

/// The successful result with the lowest test RMSE.
pub fn best(results: &[SearchResult]) -> Option<&SearchResult> {
    results
        .iter()
        .filter_map(|result| match &result.test_rmse {
            Ok(rmse) if rmse.is_finite() => Some((result, *rmse)),
            _ => None,
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(result, _)| result)
}

/// Every combination of the given SGD hyperparameters, learning rate varying slowest.
pub fn sgd_grid(
    learning_rates: &[Flt],
    num_features: &[usize],
    lambdas_user: &[Flt],
    lambdas_item: &[Flt],
) -> Vec<SearchParams> {
    let mut grid = Vec::new();
    for &learning_rate in learning_rates {
        for &k in num_features {
            for &lambda_user in lambdas_user {
                for &lambda_item in lambdas_item {
                    grid.push(SearchParams::Sgd(SgdParams::new(
                        learning_rate,
                        k,
                        lambda_user,
                        lambda_item,
                    )));
                }
            }
        }
    }
    grid
}

use std::fmt;

use polars::prelude::PolarsError;
use rayon::ThreadPoolBuildError;
use thiserror::Error;

use crate::Flt;

/// Which factor matrix a per-row solve was updating.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FactorSide {
    User,
    Item,
}

impl fmt::Display for FactorSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorSide::User => write!(f, "user"),
            FactorSide::Item => write!(f, "item"),
        }
    }
}

/// Errors surfaced by training, evaluation and the data collaborators.
#[derive(Debug, Error)]
pub enum FactorizeError {
    /// The regularized normal equations of one row could not be factorized.
    #[error("singular system while solving {side} row {index}")]
    SingularSystem { side: FactorSide, index: usize },

    /// The normal equations factorized, but the pivots are too far apart to trust the solution.
    #[error("ill-conditioned system while solving {side} row {index} (rcond {rcond:e})")]
    IllConditioned {
        side: FactorSide,
        index: usize,
        rcond: Flt,
    },

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("invalid rating {value} at item {item}, user {user}")]
    InvalidRating { item: usize, user: usize, value: Flt },

    #[error("sparse matrix: {0}")]
    Sparse(String),

    #[error("shuffle failed: {0}")]
    Shuffle(String),

    #[error("dataset: {0}")]
    Dataset(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("worker pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

impl FactorizeError {
    pub fn invalid_parameter<S: Into<String>>(name: &'static str, reason: S) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FactorizeError>;

pub(crate) fn check_components(no_components: usize) -> Result<()> {
    if no_components == 0 {
        return Err(FactorizeError::invalid_parameter(
            "num_features",
            "must be at least 1",
        ));
    }
    Ok(())
}

pub(crate) fn check_regularization(name: &'static str, value: Flt) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(FactorizeError::invalid_parameter(
            name,
            format!("must be a finite non-negative number, got {}", value),
        ));
    }
    Ok(())
}

mod als;
mod cross_validation;
mod datasets;
mod error;
mod evaluation;
mod index_groups;
mod init;
mod random;
mod ratings;
mod search;
mod sgd;

pub use als::*;
pub use cross_validation::*;
pub use datasets::*;
pub use error::{FactorSide, FactorizeError, Result};
pub use evaluation::*;
pub use index_groups::*;
pub use init::*;
pub use random::*;
pub use ratings::*;
pub use search::*;
pub use sgd::*;

pub type Flt = f64;

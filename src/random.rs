use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use shuffle::fy::FisherYates;
use shuffle::shuffler::Shuffler;

use crate::error::{FactorizeError, Result};

/// Seed every training run starts from unless told otherwise.
pub const DEFAULT_SEED: u64 = 988;

/// Randomness owned by a single training run.
///
/// Each run seeds its own generator, so concurrent runs never share state and
/// identical inputs replay identically.
pub struct RandomState {
    pub(crate) fy: FisherYates,
    pub(crate) rng: Isaac64Rng,
}

impl RandomState {
    pub fn seeded(seed: u64) -> RandomState {
        RandomState {
            fy: FisherYates::default(),
            rng: Isaac64Rng::seed_from_u64(seed),
        }
    }

    /// Fisher–Yates shuffle in place, driven by this run's generator.
    pub fn shuffle<T: Clone>(&mut self, data: &mut Vec<T>) -> Result<()> {
        if data.len() < 2 {
            return Ok(());
        }
        self.fy
            .shuffle(data, &mut self.rng)
            .map_err(|e| FactorizeError::Shuffle(e.to_string()))
    }
}

impl Default for RandomState {
    fn default() -> RandomState {
        RandomState::seeded(DEFAULT_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_ok::assert_ok;

    #[test]
    fn test_same_seed_same_permutation() {
        let mut a = (0..50).collect::<Vec<usize>>();
        let mut b = a.clone();
        assert_ok!(RandomState::seeded(7).shuffle(&mut a));
        assert_ok!(RandomState::seeded(7).shuffle(&mut b));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<usize>>());
    }

    #[test]
    fn test_successive_shuffles_differ() {
        let mut state = RandomState::default();
        let mut first = (0..50).collect::<Vec<usize>>();
        assert_ok!(state.shuffle(&mut first));
        let mut second = (0..50).collect::<Vec<usize>>();
        assert_ok!(state.shuffle(&mut second));
        assert_ne!(first, second);
    }
}

// Sequence generation from a trained chain.
//
// Each step draws the next state from the current state's row by weighted
// sampling. What happens on an absorbing state (empty row) is always picked by
// the caller through AbsorbingPolicy. Randomness comes only from the `rng`
// argument, so a seeded RNG gives reproducible output.

use std::hash::Hash;

use rand::Rng;

use crate::chain::MarkovChain;
use crate::error::{ChainError, ChainWarning};
use crate::matrix::TransitionMatrix;

/// How the first state (and a restart state) is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPolicy<S> {
    /// Dictionary index 0, i.e. the first state of the training data.
    First,
    /// Uniform over all known states.
    Random,
    /// This exact state. Must be known to the chain.
    Explicit(S),
}

/// What to do when the current state has no observed successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbsorbingPolicy {
    /// Stop and return a sequence shorter than requested.
    Terminate,
    /// Pick a fresh state with the start policy and carry on.
    Restart,
    /// Treat the state as if it moved to every known state with equal odds.
    UniformRestart,
    /// Pick the next state weighted by how often each state led somewhere in
    /// the training data.
    FrequencyWeighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The requested length was reached.
    Completed,
    /// An absorbing state was hit under [`AbsorbingPolicy::Terminate`].
    Absorbed,
}

/// Output of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<S> {
    pub states: Vec<S>,
    pub stop: StopReason,
    /// Number of times an absorbing state was reached.
    pub absorbing_hits: usize,
    /// Copied from the chain so a trivial result is never silent.
    pub warning: Option<ChainWarning>,
}

#[derive(Debug, Clone)]
pub struct Generator<S> {
    start: StartPolicy<S>,
    absorbing: AbsorbingPolicy,
}

impl<S: Clone + Eq + Hash> Generator<S> {
    pub fn new(start: StartPolicy<S>, absorbing: AbsorbingPolicy) -> Self {
        Generator { start, absorbing }
    }

    pub fn start_policy(&self) -> &StartPolicy<S> {
        &self.start
    }

    pub fn absorbing_policy(&self) -> AbsorbingPolicy {
        self.absorbing
    }

    /// Sample up to `length` states from `chain`.
    ///
    /// Returns exactly `length` states unless the absorbing policy is
    /// [`AbsorbingPolicy::Terminate`] and an absorbing state is reached first.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        chain: &MarkovChain<S>,
        length: usize,
        rng: &mut R,
    ) -> Result<Generated<S>, ChainError> {
        if let StartPolicy::Explicit(state) = &self.start {
            if !chain.contains(state) {
                return Err(ChainError::UnknownStartState);
            }
        }

        let mut indices = Vec::with_capacity(length);
        let mut stop = StopReason::Completed;
        let mut absorbing_hits = 0;

        if length > 0 {
            let mut current = self.start_index(chain, rng)?;
            indices.push(current);

            while indices.len() < length {
                let next = match sample_row(chain.matrix().row(current), rng) {
                    Some(next) => next,
                    None => {
                        absorbing_hits += 1;
                        match self.absorbing {
                            AbsorbingPolicy::Terminate => {
                                stop = StopReason::Absorbed;
                                break;
                            }
                            AbsorbingPolicy::Restart => self.start_index(chain, rng)?,
                            AbsorbingPolicy::UniformRestart => rng.gen_range(0..chain.len()),
                            AbsorbingPolicy::FrequencyWeighted => {
                                frequency_choice(chain.matrix(), rng)
                            }
                        }
                    }
                };
                indices.push(next);
                current = next;
            }
        }

        if stop == StopReason::Absorbed {
            log::warn!(
                "generation stopped at an absorbing state after {} of {} states",
                indices.len(),
                length
            );
        } else if absorbing_hits > 0 {
            log::debug!(
                "absorbing state reached {} times, handled with {:?}",
                absorbing_hits,
                self.absorbing
            );
        }

        let known = chain.dictionary().states();
        Ok(Generated {
            states: indices.iter().map(|&i| known[i].clone()).collect(),
            stop,
            absorbing_hits,
            warning: chain.warning(),
        })
    }

    fn start_index<R: Rng + ?Sized>(
        &self,
        chain: &MarkovChain<S>,
        rng: &mut R,
    ) -> Result<usize, ChainError> {
        match &self.start {
            StartPolicy::First => Ok(0),
            StartPolicy::Random => Ok(rng.gen_range(0..chain.len())),
            StartPolicy::Explicit(state) => {
                chain.index_of(state).ok_or(ChainError::UnknownStartState)
            }
        }
    }
}

/// One-call form of [`Generator::generate`].
pub fn generate<S, R>(
    chain: &MarkovChain<S>,
    length: usize,
    start: StartPolicy<S>,
    absorbing: AbsorbingPolicy,
    rng: &mut R,
) -> Result<Generated<S>, ChainError>
where
    S: Clone + Eq + Hash,
    R: Rng + ?Sized,
{
    Generator::new(start, absorbing).generate(chain, length, rng)
}

/// Convert a signed length request, rejecting negatives.
pub fn checked_length(requested: i64) -> Result<usize, ChainError> {
    usize::try_from(requested).map_err(|_| ChainError::InvalidLength(requested))
}

/// Draw a successor from a normalized row. `None` for an empty row.
fn sample_row<R: Rng + ?Sized>(row: &[(usize, f64)], rng: &mut R) -> Option<usize> {
    let &(last, _) = row.last()?;
    let target: f64 = rng.gen();
    let mut cumulative = 0.0;
    for &(index, p) in row {
        cumulative += p;
        if cumulative > target {
            return Some(index);
        }
    }
    // Rounding left the cumulative sum just under target.
    Some(last)
}

/// Draw a state weighted by its outgoing count, uniform if all counts are 0.
fn frequency_choice<R: Rng + ?Sized>(matrix: &TransitionMatrix, rng: &mut R) -> usize {
    let counts = matrix.outgoing_counts();
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return rng.gen_range(0..counts.len());
    }
    let mut x = rng.gen_range(0..total);
    for (i, &w) in counts.iter().enumerate() {
        if x < w {
            return i;
        }
        x -= w;
    }
    counts.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn zero_length_is_empty() {
        let chain = MarkovChain::build(&['a', 'b']).unwrap();
        for policy in [StartPolicy::First, StartPolicy::Random, StartPolicy::Explicit('b')] {
            let out = generate(&chain, 0, policy, AbsorbingPolicy::Terminate, &mut rng(1)).unwrap();
            assert!(out.states.is_empty());
            assert_eq!(out.stop, StopReason::Completed);
        }
    }

    #[test]
    fn unknown_start_is_rejected_even_for_zero_length() {
        let chain = MarkovChain::build(&['a', 'b']).unwrap();
        for len in [0, 4] {
            let err = generate(
                &chain,
                len,
                StartPolicy::Explicit('q'),
                AbsorbingPolicy::Restart,
                &mut rng(1),
            )
            .unwrap_err();
            assert_eq!(err, ChainError::UnknownStartState);
        }
    }

    #[test]
    fn first_policy_starts_at_index_zero() {
        let chain = MarkovChain::build(&['x', 'y', 'x']).unwrap();
        let out = generate(&chain, 4, StartPolicy::First, AbsorbingPolicy::Terminate, &mut rng(3))
            .unwrap();
        assert_eq!(out.states, vec!['x', 'y', 'x', 'y']);
    }

    #[test]
    fn random_start_covers_states() {
        let chain = MarkovChain::build(&[0u8, 1, 2, 3, 0]).unwrap();
        let mut r = rng(42);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let out = generate(&chain, 1, StartPolicy::Random, AbsorbingPolicy::Terminate, &mut r)
                .unwrap();
            seen[out.states[0] as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn only_observed_transitions_are_sampled() {
        let training = [1, 2, 1, 3, 2, 3, 1, 1, 2];
        let chain = MarkovChain::build(&training).unwrap();
        let out = generate(
            &chain,
            500,
            StartPolicy::First,
            AbsorbingPolicy::UniformRestart,
            &mut rng(9),
        )
        .unwrap();
        assert_eq!(out.states.len(), 500);
        for pair in out.states.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let absorbing = chain.matrix().is_absorbing(chain.index_of(&from).unwrap());
            assert!(absorbing || chain.probability(&from, &to) > 0.0);
        }
    }

    #[test]
    fn sampling_follows_probabilities() {
        // a -> b three times out of four, a -> c once.
        let training = ['a', 'b', 'a', 'b', 'a', 'b', 'a', 'c', 'a'];
        let chain = MarkovChain::build(&training).unwrap();
        let a = chain.index_of(&'a').unwrap();
        let b = chain.index_of(&'b').unwrap();
        let row = chain.matrix().row(a);
        let mut r = rng(5);
        let trials = 4000;
        let hits = (0..trials)
            .filter(|_| sample_row(row, &mut r) == Some(b))
            .count();
        let freq = hits as f64 / trials as f64;
        assert!((freq - 0.75).abs() < 0.05, "freq = {freq}");
    }

    #[test]
    fn restart_with_explicit_start_returns_there() {
        let chain = MarkovChain::build(&['a', 'b', 'c']).unwrap();
        let out = generate(
            &chain,
            7,
            StartPolicy::Explicit('b'),
            AbsorbingPolicy::Restart,
            &mut rng(0),
        )
        .unwrap();
        assert_eq!(out.states, vec!['b', 'c', 'b', 'c', 'b', 'c', 'b']);
        assert_eq!(out.absorbing_hits, 3);
    }

    #[test]
    fn frequency_weighted_skips_states_that_never_lead_anywhere() {
        // 'c' has outgoing count 0, so the fallback never lands on it.
        let chain = MarkovChain::build(&['a', 'b', 'c']).unwrap();
        let counts = chain.matrix().outgoing_counts();
        assert_eq!(counts, &[1, 1, 0]);
        let mut r = rng(11);
        for _ in 0..100 {
            assert_ne!(frequency_choice(chain.matrix(), &mut r), 2);
        }
    }

    #[test]
    fn frequency_weighted_falls_back_to_uniform() {
        let chain = MarkovChain::build(&["only"]).unwrap();
        let out = generate(
            &chain,
            3,
            StartPolicy::First,
            AbsorbingPolicy::FrequencyWeighted,
            &mut rng(2),
        )
        .unwrap();
        assert_eq!(out.states, vec!["only"; 3]);
        assert_eq!(out.warning, Some(ChainWarning::FullyAbsorbing));
    }

    #[test]
    fn checked_length_rejects_negatives() {
        assert_eq!(checked_length(12), Ok(12));
        assert_eq!(checked_length(0), Ok(0));
        assert_eq!(checked_length(-1), Err(ChainError::InvalidLength(-1)));
    }
}

// Trained first-order Markov chain: dictionary + transition matrix.
//
// Built once from a training sequence and read-only afterwards, so one chain
// can serve any number of generation calls (see generator.rs).

use std::hash::Hash;

use crate::dictionary::StateDictionary;
use crate::error::{ChainError, ChainWarning};
use crate::matrix::TransitionMatrix;

#[derive(Debug, Clone)]
pub struct MarkovChain<S> {
    dictionary: StateDictionary<S>,
    matrix: TransitionMatrix,
    warning: Option<ChainWarning>,
}

impl<S: Clone + Eq + Hash> MarkovChain<S> {
    pub fn build(training: &[S]) -> Result<Self, ChainError> {
        Self::build_smoothed(training, 0.0)
    }

    /// Train with additive smoothing factor `k` (0 disables smoothing).
    pub fn build_smoothed(training: &[S], k: f64) -> Result<Self, ChainError> {
        let dictionary = StateDictionary::build(training)?;
        let matrix = TransitionMatrix::build_smoothed(training, &dictionary, k)?;

        let warning = if matrix.num_edges() == 0 {
            Some(ChainWarning::FullyAbsorbing)
        } else if dictionary.len() == 1 {
            Some(ChainWarning::SingleState)
        } else {
            None
        };
        if let Some(w) = warning {
            log::warn!("{w}");
        }

        log::debug!(
            "trained chain on {} states: {} distinct, {} transitions",
            training.len(),
            dictionary.len(),
            matrix.total_transitions()
        );

        Ok(MarkovChain {
            dictionary,
            matrix,
            warning,
        })
    }

    pub fn index_of(&self, state: &S) -> Option<usize> {
        self.dictionary.index_of(state)
    }

    pub fn contains(&self, state: &S) -> bool {
        self.dictionary.contains(state)
    }

    /// Transition probability between two states, 0 if either is unknown.
    pub fn probability(&self, from: &S, to: &S) -> f64 {
        match (self.index_of(from), self.index_of(to)) {
            (Some(i), Some(j)) => self.matrix.probability(i, j),
            _ => 0.0,
        }
    }
}

impl<S> MarkovChain<S> {
    pub fn dictionary(&self) -> &StateDictionary<S> {
        &self.dictionary
    }

    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    /// Set when the chain is degenerate (single state or no transitions).
    pub fn warning(&self) -> Option<ChainWarning> {
        self.warning
    }

    pub fn len(&self) -> usize {
        self.dictionary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_chain_has_no_warning() {
        let chain = MarkovChain::build(&["a", "b", "c", "a"]).unwrap();
        assert_eq!(chain.warning(), None);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.probability(&"a", &"b"), 1.0);
        assert_eq!(chain.probability(&"a", &"zzz"), 0.0);
    }

    #[test]
    fn degenerate_chains_are_flagged() {
        let single = MarkovChain::build(&[7, 7, 7]).unwrap();
        assert_eq!(single.warning(), Some(ChainWarning::SingleState));
        assert_eq!(single.probability(&7, &7), 1.0);

        let lone = MarkovChain::build(&[7]).unwrap();
        assert_eq!(lone.warning(), Some(ChainWarning::FullyAbsorbing));
    }

    #[test]
    fn empty_training_fails() {
        let empty: Vec<u32> = Vec::new();
        assert_eq!(MarkovChain::build(&empty).unwrap_err(), ChainError::EmptyInput);
    }

    #[test]
    fn smoothing_is_validated() {
        assert_eq!(
            MarkovChain::build_smoothed(&[1, 2], -0.5).unwrap_err(),
            ChainError::InvalidSmoothing(-0.5)
        );
    }
}

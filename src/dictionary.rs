// State dictionary: distinct states mapped to dense indices in first-seen order.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::ChainError;

#[derive(Debug, Clone)]
pub struct StateDictionary<S> {
    indices: HashMap<S, usize>,
    /// Distinct states, position == index.
    states: Vec<S>,
}

impl<S: Clone + Eq + Hash> StateDictionary<S> {
    /// Index every distinct state of `sequence`. A repeated state keeps the
    /// index it got on first sight.
    pub fn build(sequence: &[S]) -> Result<Self, ChainError> {
        if sequence.is_empty() {
            return Err(ChainError::EmptyInput);
        }

        let mut indices = HashMap::new();
        let mut states = Vec::new();
        for state in sequence {
            if !indices.contains_key(state) {
                indices.insert(state.clone(), states.len());
                states.push(state.clone());
            }
        }

        Ok(StateDictionary { indices, states })
    }

    pub fn index_of(&self, state: &S) -> Option<usize> {
        self.indices.get(state).copied()
    }

    pub fn contains(&self, state: &S) -> bool {
        self.indices.contains_key(state)
    }
}

impl<S> StateDictionary<S> {
    pub fn state(&self, index: usize) -> Option<&S> {
        self.states.get(index)
    }

    /// All distinct states in index order.
    pub fn states(&self) -> &[S] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

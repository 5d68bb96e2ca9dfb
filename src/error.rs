use std::fmt;

use thiserror::Error;

/// Failures while training a chain or sampling from it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("training sequence is empty")]
    EmptyInput,

    #[error("start state is not present in the trained chain")]
    UnknownStartState,

    #[error("requested length {0} is negative")]
    InvalidLength(i64),

    #[error("state at position {0} of the training sequence is missing from the dictionary")]
    UnknownState(usize),

    #[error("smoothing factor {0} must be finite and non-negative")]
    InvalidSmoothing(f64),
}

/// A trained chain that can only produce trivial output.
///
/// Not fatal: the chain is still usable, but callers get this back alongside
/// the chain and every generated sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainWarning {
    /// Only one distinct state was observed.
    SingleState,
    /// No transition was observed at all, every state is absorbing.
    FullyAbsorbing,
}

impl fmt::Display for ChainWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainWarning::SingleState => {
                write!(f, "degenerate chain: training data holds a single distinct state")
            }
            ChainWarning::FullyAbsorbing => {
                write!(f, "degenerate chain: no transitions observed, every state is absorbing")
            }
        }
    }
}

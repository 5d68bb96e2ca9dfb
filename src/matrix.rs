// Sparse transition matrix.
//
// Built from observed consecutive pairs of a training sequence: counts per
// directed edge, then each row normalized by the row total. Rows are sorted by
// successor index. A state that was never followed by anything has an empty
// row (absorbing).
//
// With additive smoothing k > 0 every non-absorbing row spreads k pseudo-counts
// over all known states, so the row becomes dense. Absorbing rows stay empty.

use std::collections::BTreeMap;
use std::hash::Hash;

use crate::dictionary::StateDictionary;
use crate::error::ChainError;

#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    /// rows[i] = [(j, p(i -> j))], ascending j, probabilities sum to one.
    rows: Vec<Vec<(usize, f64)>>,
    /// How many times each state was followed by another one.
    outgoing: Vec<u64>,
}

impl TransitionMatrix {
    pub fn build<S: Clone + Eq + Hash>(
        sequence: &[S],
        dictionary: &StateDictionary<S>,
    ) -> Result<Self, ChainError> {
        Self::build_smoothed(sequence, dictionary, 0.0)
    }

    /// Like [`TransitionMatrix::build`] with `k` pseudo-counts added to every
    /// cell of each non-absorbing row.
    pub fn build_smoothed<S: Clone + Eq + Hash>(
        sequence: &[S],
        dictionary: &StateDictionary<S>,
        k: f64,
    ) -> Result<Self, ChainError> {
        if !k.is_finite() || k < 0.0 {
            return Err(ChainError::InvalidSmoothing(k));
        }
        if sequence.is_empty() {
            return Err(ChainError::EmptyInput);
        }

        let indices = sequence
            .iter()
            .enumerate()
            .map(|(pos, s)| dictionary.index_of(s).ok_or(ChainError::UnknownState(pos)))
            .collect::<Result<Vec<_>, _>>()?;

        let n = dictionary.len();
        let mut counts: Vec<BTreeMap<usize, u64>> = vec![BTreeMap::new(); n];
        for pair in indices.windows(2) {
            *counts[pair[0]].entry(pair[1]).or_insert(0) += 1;
        }

        let outgoing: Vec<u64> = counts.iter().map(|row| row.values().sum()).collect();
        let rows = counts
            .iter()
            .zip(&outgoing)
            .map(|(row, &total)| normalize(row, total, n, k))
            .collect();

        let matrix = TransitionMatrix { rows, outgoing };
        log::debug!(
            "transition matrix: {} states, {} edges, {} absorbing",
            matrix.num_states(),
            matrix.num_edges(),
            matrix.absorbing_states().count()
        );
        Ok(matrix)
    }

    /// Outgoing distribution of state `i`. Empty for absorbing or unknown states.
    pub fn row(&self, i: usize) -> &[(usize, f64)] {
        match self.rows.get(i) {
            Some(row) => row,
            None => &[],
        }
    }

    pub fn probability(&self, i: usize, j: usize) -> f64 {
        let row = self.row(i);
        match row.binary_search_by_key(&j, |&(succ, _)| succ) {
            Ok(pos) => row[pos].1,
            Err(_) => 0.0,
        }
    }

    pub fn is_absorbing(&self, i: usize) -> bool {
        self.row(i).is_empty()
    }

    pub fn absorbing_states(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_empty())
            .map(|(i, _)| i)
    }

    pub fn outgoing_count(&self, i: usize) -> u64 {
        self.outgoing.get(i).copied().unwrap_or(0)
    }

    pub fn outgoing_counts(&self) -> &[u64] {
        &self.outgoing
    }

    /// Number of consecutive pairs in the training sequence.
    pub fn total_transitions(&self) -> u64 {
        self.outgoing.iter().sum()
    }

    pub fn num_states(&self) -> usize {
        self.rows.len()
    }

    /// Number of non-zero cells.
    pub fn num_edges(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

fn normalize(
    counts: &BTreeMap<usize, u64>,
    total: u64,
    num_states: usize,
    k: f64,
) -> Vec<(usize, f64)> {
    if total == 0 {
        return Vec::new();
    }

    let mut row: Vec<(usize, f64)> = if k > 0.0 {
        let denom = total as f64 + k * num_states as f64;
        (0..num_states)
            .map(|j| {
                let c = counts.get(&j).copied().unwrap_or(0) as f64;
                (j, (c + k) / denom)
            })
            .collect()
    } else {
        counts
            .iter()
            .map(|(&j, &c)| (j, c as f64 / total as f64))
            .collect()
    };

    // Last cell takes the remainder so the row sums to one.
    let head: f64 = row[..row.len() - 1].iter().map(|&(_, p)| p).sum();
    if let Some(last) = row.last_mut() {
        last.1 = 1.0 - head;
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn matrix_for(seq: &[char]) -> (StateDictionary<char>, TransitionMatrix) {
        let dict = StateDictionary::build(seq).unwrap();
        let matrix = TransitionMatrix::build(seq, &dict).unwrap();
        (dict, matrix)
    }

    #[test]
    fn counts_become_probabilities() {
        // a->b twice, a->c once, b->a twice, c->a once
        let (dict, m) = matrix_for(&['a', 'b', 'a', 'c', 'a', 'b', 'a']);
        let a = dict.index_of(&'a').unwrap();
        let b = dict.index_of(&'b').unwrap();
        let c = dict.index_of(&'c').unwrap();
        assert_abs_diff_eq!(m.probability(a, b), 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.probability(a, c), 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(m.probability(a, a), 0.0);
        assert_eq!(m.probability(b, a), 1.0);
        assert_eq!(m.probability(c, a), 1.0);
        assert_eq!(m.outgoing_count(a), 3);
        assert_eq!(m.total_transitions(), 6);
        assert_eq!(m.num_edges(), 4);
    }

    #[test]
    fn rows_sum_to_one() {
        let seq: Vec<char> = "the quick brown fox jumps over the lazy dog again and again"
            .chars()
            .collect();
        let (dict, m) = matrix_for(&seq);
        for i in 0..dict.len() {
            if m.is_absorbing(i) {
                continue;
            }
            let sum: f64 = m.row(i).iter().map(|&(_, p)| p).sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn self_loop_is_certain() {
        let (_, m) = matrix_for(&['s', 's', 's']);
        assert_eq!(m.row(0), &[(0, 1.0)]);
    }

    #[test]
    fn last_state_is_absorbing() {
        let (dict, m) = matrix_for(&['a', 'b', 'c']);
        let c = dict.index_of(&'c').unwrap();
        assert!(m.is_absorbing(c));
        assert_eq!(m.absorbing_states().collect::<Vec<_>>(), vec![c]);
        assert_eq!(m.outgoing_count(c), 0);
    }

    #[test]
    fn single_element_has_no_edges() {
        let (_, m) = matrix_for(&['a']);
        assert_eq!(m.num_states(), 1);
        assert_eq!(m.num_edges(), 0);
        assert!(m.is_absorbing(0));
    }

    #[test]
    fn smoothing_fills_rows_but_not_absorbing_ones() {
        let seq = ['a', 'b', 'a', 'c'];
        let dict = StateDictionary::build(&seq).unwrap();
        let m = TransitionMatrix::build_smoothed(&seq, &dict, 1.0).unwrap();
        // a: b once, c once, total 2, three states -> (1+1)/5, (0+1)/5, (1+1)/5
        assert_abs_diff_eq!(m.probability(0, 0), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(m.probability(0, 1), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(m.probability(0, 2), 0.4, epsilon = 1e-12);
        assert_eq!(m.row(0).len(), 3);
        assert!(m.is_absorbing(2));
        let sum: f64 = m.row(1).iter().map(|&(_, p)| p).sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_bad_input() {
        let dict = StateDictionary::build(&['a', 'b']).unwrap();
        assert_eq!(
            TransitionMatrix::build(&[], &dict).unwrap_err(),
            ChainError::EmptyInput
        );
        assert_eq!(
            TransitionMatrix::build(&['a', 'z'], &dict).unwrap_err(),
            ChainError::UnknownState(1)
        );
        assert!(matches!(
            TransitionMatrix::build_smoothed(&['a', 'b'], &dict, -1.0),
            Err(ChainError::InvalidSmoothing(_))
        ));
        assert!(matches!(
            TransitionMatrix::build_smoothed(&['a', 'b'], &dict, f64::NAN),
            Err(ChainError::InvalidSmoothing(_))
        ));
    }
}

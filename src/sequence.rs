use std::hash::Hash;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::multiclass::{argmax, Perceptron};
use crate::trellis::{Cell, Trellis};
use crate::weight::{LazyWeight, Weight};

/// Features derived from the labels already assigned to preceding tokens
///
/// `history` holds at most `order` labels, oldest first. It is empty at the
/// first position of a sequence.
pub trait TransitionFeatures<L, F> {
    fn features(&self, history: &[&L]) -> Vec<F>;
}

impl<L, F, T> TransitionFeatures<L, F> for T
where
    T: Fn(&[&L]) -> Vec<F>,
{
    fn features(&self, history: &[&L]) -> Vec<F> {
        self(history)
    }
}

/// Transition features for models without label history
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransitions;

impl<L, F> TransitionFeatures<L, F> for NoTransitions {
    fn features(&self, _history: &[&L]) -> Vec<F> {
        Vec::new()
    }
}

/// Search strategy used for models of order one or higher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decoding {
    /// Commit to the best label at each position, left to right. O(nt).
    #[default]
    Greedy,
    /// Bounded-order trellis search with backpointers. O(nt²).
    Viterbi,
}

/// Multiclass perceptron for sequence tagging
///
/// Every token is scored by the wrapped [`Perceptron`] on its local features
/// plus the transition features of the labels assigned to the previous
/// `order` tokens. Scoring, updates and finalization are delegated to the
/// wrapped model; the weight type decides whether finalization averages.
#[derive(Debug, Clone)]
pub struct SequencePerceptron<F, L, T, W = f64> {
    pub(crate) base: Perceptron<F, L, W>,
    transitions: T,
    order: usize,
    decoding: Decoding,
}

/// Sequence perceptron whose weights are averaged over training time
pub type SequenceAveragedPerceptron<F, L, T> = SequencePerceptron<F, L, T, LazyWeight>;

impl<F, L, T, W> SequencePerceptron<F, L, T, W>
where
    F: Hash + Eq + Clone,
    L: Hash + Eq + Clone,
    T: TransitionFeatures<L, F>,
    W: Weight,
{
    /// Create a tagger with the given transition features and Markov order
    pub fn new(transitions: T, order: usize) -> Self {
        Self::with_base(Perceptron::new(), transitions, order)
    }

    /// Wrap an existing multiclass model
    pub fn with_base(base: Perceptron<F, L, W>, transitions: T, order: usize) -> Self {
        Self {
            base,
            transitions,
            order,
            decoding: Decoding::default(),
        }
    }

    /// Select the search strategy (builder pattern)
    pub fn with_decoding(mut self, decoding: Decoding) -> Self {
        self.decoding = decoding;
        self
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn decoding(&self) -> Decoding {
        self.decoding
    }

    /// Known labels, in registration order
    pub fn classes(&self) -> &Dictionary<L> {
        self.base.classes()
    }

    /// The wrapped multiclass model
    pub fn base(&self) -> &Perceptron<F, L, W> {
        &self.base
    }

    /// Number of processed training sequences
    pub fn time(&self) -> u64 {
        self.base.time()
    }

    pub fn is_finalized(&self) -> bool {
        self.base.is_finalized()
    }

    /// Predict the label sequence for the token sequence `xx`
    ///
    /// The result has one label per token; it is empty for an empty input
    /// or when no label has been registered yet.
    pub fn predict<X: AsRef<[F]>>(&self, xx: &[X]) -> Vec<&L> {
        let (path, _) = self.decode(xx);
        path.into_iter().map(|state| self.base.label(state)).collect()
    }

    /// Predict the label sequence along with the transition features used at
    /// every position
    pub fn predict_with_transitions<X: AsRef<[F]>>(&self, xx: &[X]) -> (Vec<Vec<F>>, Vec<&L>) {
        let (path, transitions) = self.decode(xx);
        let labels = path.into_iter().map(|state| self.base.label(state)).collect();
        (transitions, labels)
    }

    /// Total score of the label sequence `yy` for the token sequence `xx`
    ///
    /// Labels that were never registered score zero at their own position
    /// but still shape the history seen by later positions.
    pub fn score_sequence<X: AsRef<[F]>>(&self, xx: &[X], yy: &[L]) -> Result<f64> {
        if xx.len() != yy.len() {
            return Err(Error::InvalidInput("xseq and yseq must have the same length"));
        }
        let mut total = 0.0;
        for (t, (x, y)) in xx.iter().zip(yy).enumerate() {
            let history: Vec<&L> = yy[t.saturating_sub(self.order)..t].iter().collect();
            let tfeats = self.window_features(&history);
            total += self.base.score(x.as_ref(), y) + self.base.score(&tfeats, y);
        }
        Ok(total)
    }

    /// Register the gold labels, decode `xx` and correct every mistaken
    /// position, then advance the clock
    ///
    /// Each wrong position is updated with its local features plus the
    /// transition features that produced the wrong hypothesis. Returns the
    /// hypotheses made before the update.
    pub fn fit_one<X: AsRef<[F]>>(&mut self, xx: &[X], yy: &[L]) -> Result<Vec<L>> {
        self.base.ensure_trainable()?;
        if xx.len() != yy.len() {
            return Err(Error::InvalidInput("xseq and yseq must have the same length"));
        }
        let gold: Vec<u32> = yy
            .iter()
            .map(|y| self.base.classes.get_or_insert(y))
            .collect();
        let (path, transitions) = self.decode(xx);
        for (t, (&guess, &truth)) in path.iter().zip(&gold).enumerate() {
            if guess != truth {
                self.base.update_ids(xx[t].as_ref(), truth, guess, 1.0);
                self.base.update_ids(&transitions[t], truth, guess, 1.0);
            }
        }
        self.base.time += 1;
        Ok(path
            .into_iter()
            .map(|state| self.base.label(state).clone())
            .collect())
    }

    /// Prepare for inference; see [`Perceptron::finalize`]
    pub fn finalize(&mut self) -> Result<()> {
        self.base.finalize()
    }

    /// Decode `xx` into state ids, returning the transition features used at
    /// every position alongside
    fn decode<X: AsRef<[F]>>(&self, xx: &[X]) -> (Vec<u32>, Vec<Vec<F>>) {
        if xx.is_empty() || self.base.classes.is_empty() {
            return (Vec::new(), Vec::new());
        }
        if self.order == 0 {
            return self.decode_independent(xx);
        }
        match self.decoding {
            Decoding::Greedy => self.decode_greedy(xx),
            Decoding::Viterbi => {
                let path = self.viterbi(xx).decode();
                let transitions = self.path_transitions(&path);
                (path, transitions)
            }
        }
    }

    /// Markov order 0: every token on its own
    fn decode_independent<X: AsRef<[F]>>(&self, xx: &[X]) -> (Vec<u32>, Vec<Vec<F>>) {
        let path = xx
            .iter()
            .filter_map(|x| argmax(&self.base.class_scores(x.as_ref())))
            .collect();
        (path, vec![Vec::new(); xx.len()])
    }

    /// Greedy approximation of a Markov model: each token is tagged using
    /// transition features built from the earlier hypotheses
    fn decode_greedy<X: AsRef<[F]>>(&self, xx: &[X]) -> (Vec<u32>, Vec<Vec<F>>) {
        let mut path = Vec::with_capacity(xx.len());
        let mut transitions = Vec::with_capacity(xx.len());
        for x in xx {
            let start = path.len().saturating_sub(self.order);
            let tfeats = self.state_features(&path[start..]);
            let mut scores = self.base.class_scores(x.as_ref());
            self.base.accumulate(&tfeats, &mut scores);
            if let Some(state) = argmax(&scores) {
                path.push(state);
            }
            transitions.push(tfeats);
        }
        (path, transitions)
    }

    /// Build the trellis for `xx`
    ///
    /// The transition score from a predecessor depends on the labels along
    /// its best path, not only on its own identity, so the last `order`
    /// states are recovered by backtrace before scoring each transition.
    pub fn viterbi<X: AsRef<[F]>>(&self, xx: &[X]) -> Trellis {
        let num_states = self.base.classes.len();
        let mut trellis = Trellis::with_capacity(num_states, xx.len());
        let Some((first, rest)) = xx.split_first() else {
            return trellis;
        };

        // The first position sees the empty history
        let mut scores = self.base.class_scores(first.as_ref());
        self.base.accumulate(&self.state_features(&[]), &mut scores);
        let column: Vec<Cell> = scores
            .iter()
            .map(|&score| Cell {
                score,
                pointer: None,
            })
            .collect();
        trellis.push(&column);

        let mut best = vec![Cell::default(); num_states];
        let mut tscores = vec![0.0; num_states];
        for (i, x) in rest.iter().enumerate() {
            best.fill(Cell::default());
            for prev in 0..num_states as u32 {
                let history = trellis.history(i, prev, self.order);
                let tfeats = self.state_features(&history);
                tscores.fill(0.0);
                self.base.accumulate(&tfeats, &mut tscores);
                let pscore = trellis.cell(i, prev).score;
                for (cell, &tscore) in best.iter_mut().zip(&tscores) {
                    let score = pscore + tscore;
                    // Strict comparison keeps the lowest predecessor on ties
                    if score > cell.score {
                        *cell = Cell {
                            score,
                            pointer: Some(prev),
                        };
                    }
                }
            }
            let emission = self.base.class_scores(x.as_ref());
            for (cell, escore) in best.iter_mut().zip(emission) {
                cell.score += escore;
            }
            trellis.push(&best);
        }
        trellis
    }

    /// Transition features seen at every position of a decoded path
    fn path_transitions(&self, path: &[u32]) -> Vec<Vec<F>> {
        (0..path.len())
            .map(|t| self.state_features(&path[t.saturating_sub(self.order)..t]))
            .collect()
    }

    fn state_features(&self, states: &[u32]) -> Vec<F> {
        let history: Vec<&L> = states.iter().map(|&s| self.base.label(s)).collect();
        self.window_features(&history)
    }

    fn window_features(&self, history: &[&L]) -> Vec<F> {
        if self.order == 0 {
            return Vec::new();
        }
        self.transitions.features(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous_label(history: &[&&'static str]) -> Vec<String> {
        history
            .iter()
            .map(|label| format!("prev={}", label))
            .collect()
    }

    #[test]
    fn test_empty_sequence() {
        let mut model: SequencePerceptron<String, &str, _> =
            SequencePerceptron::new(previous_label, 1);
        let xx: Vec<Vec<String>> = Vec::new();
        assert!(model.predict(&xx).is_empty());
        assert!(model.fit_one(&xx, &[]).unwrap().is_empty());
        assert_eq!(model.time(), 1);
    }

    #[test]
    fn test_length_mismatch() {
        let mut model: SequencePerceptron<String, &str, _> =
            SequencePerceptron::new(previous_label, 1);
        let xx = vec![vec!["a".to_string()]];
        let err = model.fit_one(&xx, &["X", "Y"]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(model.time(), 0);
        assert!(model.classes().is_empty());
    }

    #[test]
    fn test_transition_features_used_in_update() {
        let mut model: SequencePerceptron<String, &str, _> =
            SequencePerceptron::new(previous_label, 1);
        let xx = vec![vec!["w=a".to_string()], vec!["w=b".to_string()]];
        // Both labels registered first; everything scores zero so "X" wins
        let yhat = model.fit_one(&xx, &["X", "Y"]).unwrap();
        assert_eq!(yhat, vec!["X", "X"]);
        // The second token was tagged with history ["X"]
        let base = model.base();
        assert_eq!(base.score(&["w=b".to_string()], &"Y"), 1.0);
        assert_eq!(base.score(&["prev=X".to_string()], &"Y"), 1.0);
        assert_eq!(base.score(&["prev=X".to_string()], &"X"), -1.0);
        assert_eq!(base.score(&["w=a".to_string()], &"X"), 0.0);
    }

    #[test]
    fn test_single_token_agreement() {
        let mut greedy: SequencePerceptron<String, &str, _> =
            SequencePerceptron::new(previous_label, 2);
        let data = [
            (vec![vec!["a".to_string()]], vec!["X"]),
            (vec![vec!["b".to_string()]], vec!["Y"]),
        ];
        for _ in 0..3 {
            for (xx, yy) in &data {
                greedy.fit_one(xx, yy).unwrap();
            }
        }
        let viterbi = greedy.clone().with_decoding(Decoding::Viterbi);
        for (xx, _) in &data {
            assert_eq!(greedy.predict(xx), viterbi.predict(xx));
        }
    }
}

use std::hash::Hash;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::store::ClassWeights;
use crate::weight::{LazyWeight, Weight};

/// Index of the highest score, preferring the lowest index on ties
pub(crate) fn argmax(scores: &[f64]) -> Option<u32> {
    let mut best: Option<(u32, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, max_score)) if max_score >= score => {}
            _ => best = Some((i as u32, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Multiclass perceptron over sparse binary features
///
/// Each class is an opaque hashable value and each feature is an opaque
/// hashable token whose presence means it fires. The weight of a
/// `(feature, class)` pair contributes to the class score whenever the
/// feature fires.
///
/// Classes are registered in the order they are first seen. Ties between
/// class scores always go to the class registered first, so predictions do
/// not depend on hash iteration order.
#[derive(Debug, Clone)]
pub struct Perceptron<F, L, W = f64> {
    pub(crate) classes: Dictionary<L>,
    pub(crate) weights: ClassWeights<F, W>,
    pub(crate) time: u64,
    pub(crate) finalized: bool,
}

/// Multiclass perceptron whose weights are averaged over training time
pub type AveragedPerceptron<F, L> = Perceptron<F, L, LazyWeight>;

impl<F, L, W> Perceptron<F, L, W>
where
    F: Hash + Eq + Clone,
    L: Hash + Eq + Clone,
    W: Weight,
{
    pub fn new() -> Self {
        Self {
            classes: Dictionary::new(),
            weights: ClassWeights::new(),
            time: 0,
            finalized: false,
        }
    }

    /// Create a model with `default` registered as the first class
    ///
    /// Until some other class gains a positive score, `default` wins every
    /// prediction.
    pub fn with_default(default: L) -> Self {
        let mut model = Self::new();
        model.classes.get_or_insert(&default);
        model
    }

    /// Known classes, in registration order
    pub fn classes(&self) -> &Dictionary<L> {
        &self.classes
    }

    /// Score of class `y` for the feature vector `x`
    pub fn score(&self, x: &[F], y: &L) -> f64 {
        match self.classes.id(y) {
            Some(class) => x.iter().map(|feature| self.weights.get(feature, class)).sum(),
            None => 0.0,
        }
    }

    /// Scores of every known class for the feature vector `x`
    ///
    /// Classes without any contributing weight score zero. The result
    /// follows registration order.
    pub fn scores(&self, x: &[F]) -> Vec<(&L, f64)> {
        self.classes.iter().zip(self.class_scores(x)).collect()
    }

    /// Most likely class for the feature vector `x`
    ///
    /// Returns `None` only when no class has been registered.
    pub fn predict(&self, x: &[F]) -> Option<&L> {
        argmax(&self.class_scores(x)).and_then(|class| self.classes.get(class))
    }

    /// Register `y`, predict `x`, update on a mistake and advance the clock
    ///
    /// Returns the hypothesis made before the update.
    pub fn fit_one(&mut self, x: &[F], y: &L) -> Result<L> {
        self.ensure_trainable()?;
        let gold = self.classes.get_or_insert(y);
        let scores = self.class_scores(x);
        let guess = argmax(&scores).unwrap_or(gold);
        if guess != gold {
            self.update_ids(x, gold, guess, 1.0);
        }
        self.time += 1;
        Ok(self.label(guess).clone())
    }

    /// Reward the correct observation `y` and punish the incorrect hypothesis
    /// `yhat` with the update `tau`
    pub fn update(&mut self, x: &[F], y: &L, yhat: &L, tau: f64) -> Result<()> {
        self.ensure_trainable()?;
        let gold = self.classes.get_or_insert(y);
        let guess = self.classes.get_or_insert(yhat);
        self.update_ids(x, gold, guess, tau);
        Ok(())
    }

    /// Prepare for inference: average (when applicable) and drop zero weights
    ///
    /// Classes are never removed. Calling it again on a finalized model
    /// does nothing.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.weights.finalize(self.time)?;
        self.finalized = true;
        Ok(())
    }

    /// Weight storage
    pub fn weights(&self) -> &ClassWeights<F, W> {
        &self.weights
    }

    /// Number of processed training instances
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Add the class scores of `x` into `out`, indexed by class id
    pub(crate) fn accumulate(&self, x: &[F], out: &mut [f64]) {
        for feature in x {
            if let Some(row) = self.weights.row(feature) {
                for (&class, value) in row.iter() {
                    out[class as usize] += value;
                }
            }
        }
    }

    pub(crate) fn class_scores(&self, x: &[F]) -> Vec<f64> {
        let mut scores = vec![0.0; self.classes.len()];
        self.accumulate(x, &mut scores);
        scores
    }

    pub(crate) fn update_ids(&mut self, x: &[F], gold: u32, guess: u32, tau: f64) {
        let time = self.time;
        for feature in x {
            let row = self.weights.row_mut(feature.clone());
            row.update(gold, tau, time);
            row.update(guess, -tau, time);
        }
    }

    pub(crate) fn label(&self, class: u32) -> &L {
        &self.classes.as_slice()[class as usize]
    }

    pub(crate) fn ensure_trainable(&self) -> Result<()> {
        if self.finalized {
            Err(Error::Finalized)
        } else {
            Ok(())
        }
    }
}

impl<F, L, W> Default for Perceptron<F, L, W>
where
    F: Hash + Eq + Clone,
    L: Hash + Eq + Clone,
    W: Weight,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_ties_prefer_lowest_index() {
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.0]), Some(0));
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[-1.0, -1.0]), Some(0));
        assert_eq!(argmax(&[f64::NEG_INFINITY, -5.0]), Some(1));
    }

    #[test]
    fn test_update_scores() {
        let mut model: Perceptron<&str, &str> = Perceptron::new();
        model.update(&["f1"], &"N", &"V", 1.0).unwrap();
        assert_eq!(model.scores(&["f1"]), vec![(&"N", 1.0), (&"V", -1.0)]);
        assert_eq!(model.score(&["f1"], &"N"), 1.0);
        assert_eq!(model.score(&["f1"], &"ADJ"), 0.0);
        assert_eq!(model.predict(&["f1"]), Some(&"N"));
    }

    #[test]
    fn test_scores_include_every_class() {
        let mut model: Perceptron<&str, &str> = Perceptron::new();
        model.update(&["f1"], &"A", &"B", 1.0).unwrap();
        model.update(&["f2"], &"C", &"A", 1.0).unwrap();
        assert_eq!(
            model.scores(&["f1"]),
            vec![(&"A", 1.0), (&"B", -1.0), (&"C", 0.0)]
        );
        assert_eq!(
            model.scores(&["unseen"]),
            vec![(&"A", 0.0), (&"B", 0.0), (&"C", 0.0)]
        );
    }

    #[test]
    fn test_predict_ties_go_to_first_registered() {
        let mut model: Perceptron<&str, &str> = Perceptron::new();
        assert_eq!(model.predict(&["a"]), None);
        model.fit_one(&["a"], &"Z").unwrap();
        model.fit_one(&["b"], &"A").unwrap();
        // "c" never fired: every class scores zero
        assert_eq!(model.predict(&["c"]), Some(&"Z"));
    }

    #[test]
    fn test_with_default() {
        let model: Perceptron<&str, &str> = Perceptron::with_default("O");
        assert_eq!(model.classes().len(), 1);
        assert_eq!(model.predict(&["anything"]), Some(&"O"));
    }

    #[test]
    fn test_fit_one() {
        let mut model: Perceptron<&str, &str> = Perceptron::new();
        // Only one class known: always right
        assert_eq!(model.fit_one(&["a"], &"X").unwrap(), "X");
        assert!(model.weights().is_empty());
        // "Y" is registered before predicting, but loses the tie to "X"
        assert_eq!(model.fit_one(&["b"], &"Y").unwrap(), "X");
        assert_eq!(model.score(&["b"], &"Y"), 1.0);
        assert_eq!(model.score(&["b"], &"X"), -1.0);
        assert_eq!(model.fit_one(&["b"], &"Y").unwrap(), "Y");
        assert_eq!(model.time(), 3);
    }

    #[test]
    fn test_finalize_averaged_is_idempotent() {
        let mut model: AveragedPerceptron<&str, &str> = Perceptron::new();
        model.fit_one(&["a"], &"X").unwrap();
        model.fit_one(&["b"], &"Y").unwrap();
        model.fit_one(&["b"], &"Y").unwrap();
        model.fit_one(&["a"], &"X").unwrap();
        model.finalize().unwrap();

        // "b" moved at t=1 and held for three of four ticks
        assert_eq!(model.score(&["b"], &"Y"), 0.75);
        assert_eq!(model.score(&["b"], &"X"), -0.75);
        let before: Vec<f64> = model.scores(&["a", "b"]).iter().map(|&(_, s)| s).collect();

        model.finalize().unwrap();
        let after: Vec<f64> = model.scores(&["a", "b"]).iter().map(|&(_, s)| s).collect();
        assert_eq!(before, after);
        assert!(matches!(model.fit_one(&["a"], &"X"), Err(Error::Finalized)));
        assert_eq!(model.classes().len(), 2);
    }

    #[test]
    fn test_finalize_prunes_zero_weights() {
        let mut model: Perceptron<&str, &str> = Perceptron::new();
        model.update(&["a"], &"X", &"Y", 1.0).unwrap();
        model.update(&["a"], &"Y", &"X", 1.0).unwrap();
        model.update(&["b"], &"X", &"Y", 1.0).unwrap();
        assert_eq!(model.weights().len(), 4);
        model.finalize().unwrap();
        assert_eq!(model.weights().len(), 2);
        assert!(model.weights().iter().all(|(_, _, value)| value != 0.0));
        assert_eq!(model.classes().len(), 2);
    }
}

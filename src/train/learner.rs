use std::hash::Hash;

use crate::accuracy::Accuracy;
use crate::binary::BinaryPerceptron;
use crate::error::Result;
use crate::multiclass::Perceptron;
use crate::sequence::{SequencePerceptron, TransitionFeatures};
use crate::weight::Weight;

/// A model trained one instance at a time by a [`Trainer`](super::Trainer)
pub trait OnlineLearner {
    /// One training input
    type Input;
    /// Its gold annotation, also the type of hypotheses
    type Target;

    /// Predict `x`, correct the model on a mistake and advance its clock;
    /// returns the hypothesis made before correcting
    fn fit_one(&mut self, x: &Self::Input, y: &Self::Target) -> Result<Self::Target>;

    /// Prepare the model for inference once training is over
    fn finalize(&mut self) -> Result<()>;

    /// Record a hypothesis against its gold annotation
    fn tally(accuracy: &mut Accuracy, gold: &Self::Target, hypothesis: &Self::Target);
}

impl<F, W> OnlineLearner for BinaryPerceptron<F, W>
where
    F: Hash + Eq + Clone,
    W: Weight,
{
    type Input = Vec<F>;
    type Target = bool;

    fn fit_one(&mut self, x: &Vec<F>, y: &bool) -> Result<bool> {
        BinaryPerceptron::fit_one(self, x, y)
    }

    fn finalize(&mut self) -> Result<()> {
        BinaryPerceptron::finalize(self)
    }

    fn tally(accuracy: &mut Accuracy, gold: &bool, hypothesis: &bool) {
        accuracy.update(gold, hypothesis);
    }
}

impl<F, L, W> OnlineLearner for Perceptron<F, L, W>
where
    F: Hash + Eq + Clone,
    L: Hash + Eq + Clone,
    W: Weight,
{
    type Input = Vec<F>;
    type Target = L;

    fn fit_one(&mut self, x: &Vec<F>, y: &L) -> Result<L> {
        Perceptron::fit_one(self, x, y)
    }

    fn finalize(&mut self) -> Result<()> {
        Perceptron::finalize(self)
    }

    fn tally(accuracy: &mut Accuracy, gold: &L, hypothesis: &L) {
        accuracy.update(gold, hypothesis);
    }
}

/// Sequences are scored per token.
impl<F, L, T, W> OnlineLearner for SequencePerceptron<F, L, T, W>
where
    F: Hash + Eq + Clone,
    L: Hash + Eq + Clone,
    T: TransitionFeatures<L, F>,
    W: Weight,
{
    type Input = Vec<Vec<F>>;
    type Target = Vec<L>;

    fn fit_one(&mut self, xx: &Vec<Vec<F>>, yy: &Vec<L>) -> Result<Vec<L>> {
        SequencePerceptron::fit_one(self, xx, yy)
    }

    fn finalize(&mut self) -> Result<()> {
        SequencePerceptron::finalize(self)
    }

    fn tally(accuracy: &mut Accuracy, gold: &Vec<L>, hypothesis: &Vec<L>) {
        for (y, yhat) in gold.iter().zip(hypothesis) {
            accuracy.update(y, yhat);
        }
    }
}

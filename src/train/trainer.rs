use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::learner::OnlineLearner;
use super::progress::{EpochReport, LogProgress, Progress};
use crate::accuracy::Accuracy;
use crate::error::{Error, Result};

fn shuffle_indices<R: Rng + ?Sized>(indices: &mut [usize], rng: &mut R) {
    indices.shuffle(rng);
}

/// Training parameters
#[derive(Debug, Clone)]
pub struct TrainerParams {
    epochs: usize,
    shuffle_seed: Option<u64>,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            epochs: 1,
            shuffle_seed: None,
        }
    }
}

impl TrainerParams {
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn set_epochs(&mut self, epochs: usize) -> Result<()> {
        if epochs < 1 {
            return Err(Error::InvalidInput("epochs must be at least 1"));
        }
        self.epochs = epochs;
        Ok(())
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

/// Online trainer
///
/// Holds the training instances and drives epochs over them: every epoch
/// visits the instances in a freshly shuffled order and hands each one to
/// the model's `fit_one`. The model is finalized once, after the last epoch,
/// so averaged weights are averaged over every instance of every epoch.
pub struct Trainer<M: OnlineLearner> {
    /// Training instances
    instances: Vec<(M::Input, M::Target)>,
    /// Training parameters
    params: TrainerParams,
}

impl<M: OnlineLearner> Trainer<M> {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            params: TrainerParams::default(),
        }
    }

    /// Get training parameters
    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut TrainerParams {
        &mut self.params
    }

    /// Set the number of epochs (builder pattern)
    pub fn with_epochs(mut self, epochs: usize) -> Result<Self> {
        self.params.set_epochs(epochs)?;
        Ok(self)
    }

    /// Set the shuffle seed (builder pattern)
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.params.set_shuffle_seed(Some(seed));
        self
    }

    /// Append a training instance
    pub fn append(&mut self, x: M::Input, y: M::Target) {
        self.instances.push((x, y));
    }

    /// Number of training instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Train `model`, shuffling with a generator seeded from the parameters
    /// and reporting progress through `tracing`
    pub fn train(&self, model: &mut M) -> Result<Vec<EpochReport>> {
        let mut rng = match self.params.shuffle_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.fit(model, &mut rng, &mut LogProgress)
    }

    /// Train `model` for the configured number of epochs, then finalize it
    ///
    /// The same generator state, data and epoch count always produce the
    /// same model.
    pub fn fit<R, P>(&self, model: &mut M, rng: &mut R, progress: &mut P) -> Result<Vec<EpochReport>>
    where
        R: Rng + ?Sized,
        P: Progress + ?Sized,
    {
        if self.instances.is_empty() {
            return Err(Error::InvalidInput("no training data"));
        }

        let epochs = self.params.epochs();
        let mut order: Vec<usize> = (0..self.instances.len()).collect();
        let mut reports = Vec::with_capacity(epochs);

        progress.on_train_begin(epochs, self.instances.len());
        for epoch in 1..=epochs {
            progress.on_epoch_begin(epoch);
            let tic = Instant::now();
            let mut accuracy = Accuracy::new();

            if order.len() > 1 {
                shuffle_indices(&mut order, rng);
            }

            for &idx in &order {
                let (x, y) = &self.instances[idx];
                let yhat = model.fit_one(x, y)?;
                M::tally(&mut accuracy, y, &yhat);
            }

            let report = EpochReport {
                epoch,
                accuracy: accuracy.accuracy(),
                elapsed: tic.elapsed(),
            };
            progress.on_epoch_end(&report);
            reports.push(report);
        }

        model.finalize()?;
        progress.on_train_end(self.instances.len() as u64 * epochs as u64);
        Ok(reports)
    }
}

impl<M: OnlineLearner> Default for Trainer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: OnlineLearner> Extend<(M::Input, M::Target)> for Trainer<M> {
    fn extend<I: IntoIterator<Item = (M::Input, M::Target)>>(&mut self, iter: I) {
        self.instances.extend(iter);
    }
}

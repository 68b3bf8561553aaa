use std::fmt;
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::store::WeightMap;
use crate::weight::{LazyWeight, Weight};

/// Gold labels accepted by binary models
pub trait BinaryLabel: fmt::Debug {
    /// `Some(true)` for the positive class, `Some(false)` for the negative
    /// class, `None` when the value is not a binary outcome.
    fn polarity(&self) -> Option<bool>;
}

impl BinaryLabel for bool {
    fn polarity(&self) -> Option<bool> {
        Some(*self)
    }
}

impl BinaryLabel for i32 {
    fn polarity(&self) -> Option<bool> {
        match *self {
            1 => Some(true),
            0 | -1 => Some(false),
            _ => None,
        }
    }
}

impl BinaryLabel for str {
    fn polarity(&self) -> Option<bool> {
        match self {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }
}

impl BinaryLabel for String {
    fn polarity(&self) -> Option<bool> {
        self.as_str().polarity()
    }
}

impl<T: BinaryLabel + ?Sized> BinaryLabel for &T {
    fn polarity(&self) -> Option<bool> {
        (**self).polarity()
    }
}

/// Binary perceptron classifier over sparse binary features
///
/// A single weight per feature; an instance is positive when the summed
/// weight of its firing features is non-negative.
#[derive(Debug, Clone)]
pub struct BinaryPerceptron<F, W = f64> {
    pub(crate) weights: WeightMap<F, W>,
    pub(crate) time: u64,
    pub(crate) finalized: bool,
}

/// Binary perceptron whose weights are averaged over training time
pub type BinaryAveragedPerceptron<F> = BinaryPerceptron<F, LazyWeight>;

impl<F: Hash + Eq + Clone, W: Weight> BinaryPerceptron<F, W> {
    pub fn new() -> Self {
        Self {
            weights: WeightMap::new(),
            time: 0,
            finalized: false,
        }
    }

    /// Score of the feature vector `x`
    pub fn score(&self, x: &[F]) -> f64 {
        x.iter().map(|feature| self.weights.get(feature)).sum()
    }

    /// Binary decision for the feature vector `x`
    pub fn predict(&self, x: &[F]) -> bool {
        self.score(x) >= 0.0
    }

    /// Predict `x`, update on a mistake and advance the clock
    ///
    /// Returns the hypothesis made before the update.
    pub fn fit_one<Y: BinaryLabel + ?Sized>(&mut self, x: &[F], y: &Y) -> Result<bool> {
        let gold = polarity(y)?;
        self.ensure_trainable()?;
        let yhat = self.predict(x);
        if yhat != gold {
            self.update(x, y, 1.0)?;
        }
        self.time += 1;
        Ok(yhat)
    }

    /// Reward the correct observation `y` with the update `tau`
    ///
    /// Every feature of `x` moves by `tau` towards `y`. Labels that are not
    /// binary outcomes are rejected before any weight changes.
    pub fn update<Y: BinaryLabel + ?Sized>(&mut self, x: &[F], y: &Y, tau: f64) -> Result<()> {
        let tau = if polarity(y)? { tau } else { -tau };
        self.ensure_trainable()?;
        for feature in x {
            self.weights.update(feature.clone(), tau, self.time);
        }
        Ok(())
    }

    /// Prepare for inference: average (when applicable) and drop zero weights
    ///
    /// Calling it again on a finalized model does nothing.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.weights.finalize(self.time)?;
        self.finalized = true;
        Ok(())
    }

    /// Weight of a single feature
    pub fn weight(&self, feature: &F) -> f64 {
        self.weights.get(feature)
    }

    /// Weight storage
    pub fn weights(&self) -> &WeightMap<F, W> {
        &self.weights
    }

    /// Number of processed training instances
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn ensure_trainable(&self) -> Result<()> {
        if self.finalized {
            Err(Error::Finalized)
        } else {
            Ok(())
        }
    }
}

impl<F: Hash + Eq + Clone, W: Weight> Default for BinaryPerceptron<F, W> {
    fn default() -> Self {
        Self::new()
    }
}

fn polarity<Y: BinaryLabel + ?Sized>(y: &Y) -> Result<bool> {
    y.polarity().ok_or_else(|| Error::InvalidLabel(format!("{:?}", y)))
}

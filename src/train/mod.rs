//! Training module for perceptron models
//!
//! A [`Trainer`] holds the training instances and drives epochs over any
//! model implementing [`OnlineLearner`], reporting through [`Progress`].

mod learner;
mod progress;
mod trainer;

// Re-export public types
pub use self::learner::OnlineLearner;
pub use self::progress::{EpochReport, LogProgress, NoProgress, Progress};
pub use self::trainer::{Trainer, TrainerParams};

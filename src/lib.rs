//! Online perceptron classifiers in pure Rust
//!
//! This library provides binary, multiclass and sequence perceptrons with
//! optional weight averaging. Weights are averaged lazily: each one only
//! records when it last changed, so the cost of averaging does not grow
//! with the number of training steps.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use perceptron::train::Trainer;
//! use perceptron::SequenceAveragedPerceptron;
//!
//! fn previous(history: &[&String]) -> Vec<String> {
//!     history.iter().map(|y| format!("prev={}", y)).collect()
//! }
//!
//! let mut trainer = Trainer::new().with_epochs(5)?.with_shuffle_seed(42);
//! trainer.append(
//!     vec![vec!["walk".to_string()], vec!["shop".to_string()]],
//!     vec!["sunny".to_string(), "rainy".to_string()],
//! );
//!
//! let mut model: SequenceAveragedPerceptron<String, String, _> =
//!     SequenceAveragedPerceptron::new(previous, 1);
//! trainer.train(&mut model)?;
//! model.save("model.lpcp")?;
//! # Ok::<(), perceptron::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use perceptron::{ModelFile, SequencePerceptron};
//!
//! fn previous(history: &[&String]) -> Vec<String> {
//!     history.iter().map(|y| format!("prev={}", y)).collect()
//! }
//!
//! let model_data = std::fs::read("model.lpcp")?;
//! let model = ModelFile::new(&model_data)?;
//! let tagger: SequencePerceptron<String, String, _> =
//!     SequencePerceptron::from_model(&model, previous)?;
//!
//! let xseq = vec![vec!["walk".to_string()], vec!["shop".to_string()]];
//! let result = tagger.predict(&xseq);
//! # Ok::<(), perceptron::Error>(())
//! ```

mod accuracy;
mod binary;
mod dictionary;
mod error;
mod model;
mod model_writer;
mod multiclass;
mod sequence;
mod store;
mod trellis;
mod weight;

/// Training loop driving any online learner over a dataset
pub mod train;

// Re-export main types
pub use self::accuracy::Accuracy;
pub use self::binary::{BinaryAveragedPerceptron, BinaryLabel, BinaryPerceptron};
pub use self::dictionary::Dictionary;
pub use self::error::{Error, Result};
pub use self::model::{Entry, ModelFile, ModelFlags, ModelKind};
pub use self::multiclass::{AveragedPerceptron, Perceptron};
pub use self::sequence::{
    Decoding, NoTransitions, SequenceAveragedPerceptron, SequencePerceptron, TransitionFeatures,
};
pub use self::store::{ClassWeights, WeightMap};
pub use self::trellis::{Cell, Trellis};
pub use self::weight::{LazyWeight, Weight};

// Re-export training types for convenience
pub use self::train::{Trainer, TrainerParams};

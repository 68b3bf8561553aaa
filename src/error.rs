use std::io;

use thiserror::Error;

/// Errors produced while training, finalizing or persisting a model
#[derive(Error, Debug)]
pub enum Error {
    /// A binary model was given a gold label that is neither true nor false
    #[error("invalid label: {0} is not a binary outcome")]
    InvalidLabel(String),

    /// Averaging was requested before any training instance was processed
    #[error("cannot average weights at time 0")]
    DegenerateModel,

    /// The model has been finalized and is read-only
    #[error("model is finalized and can no longer be updated")]
    Finalized,

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("invalid model format: {0}")]
    InvalidModel(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidLabel("\"maybe\"".to_string());
        assert_eq!(err.to_string(), "invalid label: \"maybe\" is not a binary outcome");

        let err = Error::InvalidInput("epochs must be at least 1");
        assert_eq!(err.to_string(), "epochs must be at least 1");

        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "short read").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "short read");
    }
}
